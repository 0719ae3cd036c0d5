use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a host expects hover text on interactive chat messages to be
/// expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoverFormat {
    /// Pre-1.16 hover events carrying a flat legacy text component.
    LegacyText,
    /// 1.16+ hover events carrying structured content.
    Content,
}

pub trait HostCapabilities: Send + Sync + fmt::Debug {
    fn revision(&self) -> &'static str;

    /// Every supported revision attaches click links to messages; only the
    /// hover encoding differs.
    fn hover_format(&self) -> HoverFormat;
}

#[derive(Debug)]
pub struct HostProfile {
    revision: &'static str,
    hover_format: HoverFormat,
}

impl HostCapabilities for HostProfile {
    fn revision(&self) -> &'static str {
        self.revision
    }

    fn hover_format(&self) -> HoverFormat {
        self.hover_format
    }
}

static V1_8_R3: HostProfile = HostProfile {
    revision: "v1_8_R3",
    hover_format: HoverFormat::LegacyText,
};
static V1_9_R2: HostProfile = HostProfile {
    revision: "v1_9_R2",
    hover_format: HoverFormat::LegacyText,
};
static V1_12_R1: HostProfile = HostProfile {
    revision: "v1_12_R1",
    hover_format: HoverFormat::LegacyText,
};
static V1_15_R1: HostProfile = HostProfile {
    revision: "v1_15_R1",
    hover_format: HoverFormat::LegacyText,
};
static V1_17_R1: HostProfile = HostProfile {
    revision: "v1_17_R1",
    hover_format: HoverFormat::Content,
};
static V1_19_R3: HostProfile = HostProfile {
    revision: "v1_19_R3",
    hover_format: HoverFormat::Content,
};

/// Supported server revisions. Each maps to exactly one capability profile,
/// chosen once when the updater is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HostVersion {
    V1_8R3,
    V1_9R2,
    V1_12R1,
    V1_15R1,
    V1_17R1,
    #[default]
    V1_19R3,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported host revision: {input}")]
pub struct UnsupportedHost {
    pub input: String,
}

impl HostVersion {
    pub const ALL: [Self; 6] = [
        Self::V1_8R3,
        Self::V1_9R2,
        Self::V1_12R1,
        Self::V1_15R1,
        Self::V1_17R1,
        Self::V1_19R3,
    ];

    #[must_use]
    pub fn profile(self) -> &'static HostProfile {
        match self {
            Self::V1_8R3 => &V1_8_R3,
            Self::V1_9R2 => &V1_9_R2,
            Self::V1_12R1 => &V1_12_R1,
            Self::V1_15R1 => &V1_15_R1,
            Self::V1_17R1 => &V1_17_R1,
            Self::V1_19R3 => &V1_19_R3,
        }
    }

    #[must_use]
    pub fn revision(self) -> &'static str {
        self.profile().revision()
    }

    /// Resolve the revision from a server implementation package such as
    /// `org.bukkit.craftbukkit.v1_19_R3`, or from the bare revision.
    ///
    /// # Errors
    /// Returns [`UnsupportedHost`] when no segment names a known revision.
    pub fn from_package(package: &str) -> Result<Self, UnsupportedHost> {
        package
            .trim()
            .split('.')
            .filter(|segment| segment.starts_with('v'))
            .find_map(|segment| {
                Self::ALL
                    .into_iter()
                    .find(|version| version.revision().eq_ignore_ascii_case(segment))
            })
            .ok_or_else(|| UnsupportedHost {
                input: package.to_string(),
            })
    }
}

impl FromStr for HostVersion {
    type Err = UnsupportedHost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_package(s)
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.revision())
    }
}

#[cfg(test)]
mod tests {
    use super::{HostCapabilities, HostVersion, HoverFormat};

    #[test]
    fn package_name_resolves_revision() {
        assert_eq!(
            HostVersion::from_package("org.bukkit.craftbukkit.v1_19_R3"),
            Ok(HostVersion::V1_19R3)
        );
        assert_eq!("v1_8_R3".parse::<HostVersion>(), Ok(HostVersion::V1_8R3));
    }

    #[test]
    fn unknown_revision_is_rejected() {
        let error = HostVersion::from_package("org.bukkit.craftbukkit.v1_20_R1")
            .expect_err("unsupported revision should fail");
        assert_eq!(error.input, "org.bukkit.craftbukkit.v1_20_R1");
        assert!(HostVersion::from_package("org.bukkit.craftbukkit").is_err());
    }

    #[test]
    fn every_revision_has_a_profile() {
        for version in HostVersion::ALL {
            assert_eq!(version.profile().revision(), version.revision());
        }
    }

    #[test]
    fn modern_hosts_use_content_hover() {
        assert_eq!(HostVersion::V1_8R3.profile().hover_format(), HoverFormat::LegacyText);
        assert_eq!(HostVersion::V1_17R1.profile().hover_format(), HoverFormat::Content);
    }
}
