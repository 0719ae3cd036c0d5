use beacon_platform::HoverFormat;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::state::{PassFailure, PassOutcome, UpdateResult, UpdateState};

const BANNER_WIDTH: usize = 60;

/// Opaque handle for an audience member, as issued by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceMember {
    pub id: MemberId,
    pub permitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Audience {
    #[default]
    All,
    Console,
    Members,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Console,
    Member(MemberId),
}

/// A rendered message. Hover text and click link are hints the sink may
/// ignore when the host cannot show them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub lines: Vec<String>,
    pub hover: Option<String>,
    pub link: Option<String>,
    pub hover_format: HoverFormat,
}

impl Notification {
    fn text(lines: Vec<String>, hover_format: HoverFormat) -> Self {
        Self {
            lines,
            hover: None,
            link: None,
            hover_format,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, recipient: &Recipient, notification: &Notification);
}

pub trait RecipientDirectory: Send + Sync {
    /// Members currently able to receive notifications.
    fn online(&self) -> Vec<MemberId>;

    fn has_permission(&self, member: &MemberId, permission: &str) -> bool;
}

/// Writes console notifications to the log and drops member notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, recipient: &Recipient, notification: &Notification) {
        match recipient {
            Recipient::Console => {
                for line in &notification.lines {
                    info!("{line}");
                }
            }
            Recipient::Member(id) => {
                debug!("No member sink configured, dropping notification for {id}");
            }
        }
    }
}

/// A directory with nobody in it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDirectory;

impl RecipientDirectory for EmptyDirectory {
    fn online(&self) -> Vec<MemberId> {
        Vec::new()
    }

    fn has_permission(&self, _member: &MemberId, _permission: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Console,
    Member,
}

/// Renders the canned messages for one pass.
struct Messages<'a> {
    plugin: &'a str,
    state: &'a UpdateState,
    hover_format: HoverFormat,
}

impl Messages<'_> {
    fn render(&self, outcome: &PassOutcome, channel: Channel) -> Option<Notification> {
        match outcome {
            PassOutcome::Skipped => None,
            PassOutcome::Failed(failure) => Some(self.check_failed(failure)),
            PassOutcome::Completed(result) => Some(self.for_result(*result, channel)),
        }
    }

    fn for_result(&self, result: UpdateResult, channel: Channel) -> Notification {
        let plugin = self.plugin;
        let latest = &self.state.latest_version;
        let line = match result {
            UpdateResult::Disabled => "Updater is currently disabled. No update checks will be performed. \
                 Enable the updater to stay up-to-date with the latest improvements."
                .to_string(),
            UpdateResult::Latest => {
                "No updates found. We're working on enhancing your experience. Stay tuned!".to_string()
            }
            UpdateResult::Downloaded => format!(
                "Successfully downloaded ({plugin} v{latest}). Please install it from your update \
                 folder to enjoy the latest improvements. Happy updating!"
            ),
            UpdateResult::Exists => format!(
                "{plugin} v{latest} update already downloaded! Please check your Update folder and \
                 install it for the latest enhancements. Enjoy the new features!"
            ),
            UpdateResult::UpdateAvailable => {
                return match channel {
                    Channel::Console => self.update_banner(),
                    Channel::Member => self.update_prompt(),
                };
            }
        };
        Notification::text(vec![line], self.hover_format)
    }

    fn update_banner(&self) -> Notification {
        let release = self.state.active_release();
        let border = "*".repeat(BANNER_WIDTH);
        let mut lines = vec![
            border.clone(),
            format!(
                "Version ({}) is now available for {}.",
                self.state.latest_version, self.plugin
            ),
        ];
        if let Some(link) = release.and_then(|r| r.download_link.as_deref()) {
            lines.push(format!("Download: {link}"));
        }
        if let Some(link) = release.and_then(|r| r.changelog_link.as_deref()) {
            lines.push(format!("Changelog: {link}"));
        }
        if let Some(link) = release.and_then(|r| r.donation_link.as_deref()) {
            lines.push(format!("Donate: {link}"));
        }
        lines.push(border);
        Notification::text(lines, self.hover_format)
    }

    fn update_prompt(&self) -> Notification {
        let release = self.state.active_release();
        let download = release.and_then(|r| r.download_link.clone());
        let action = if download.is_some() { "download" } else { "view" };
        let link = download.or_else(|| release.and_then(|r| r.changelog_link.clone()));

        Notification {
            lines: vec!["Update available! Click/Hover over this text for more info.".to_string()],
            hover: Some(format!(
                "{} v{} -> v{}\nClick here to {action} update",
                self.plugin, self.state.current_version, self.state.latest_version
            )),
            link,
            hover_format: self.hover_format,
        }
    }

    fn check_failed(&self, failure: &PassFailure) -> Notification {
        Notification::text(
            vec![format!(
                "Unable to check {} for updates ({failure}). See the update log for details.",
                self.plugin
            )],
            self.hover_format,
        )
    }
}

/// Routes pass results to the console and the permitted audience.
pub struct NotificationDispatcher {
    plugin: String,
    permission: Option<String>,
    hover_format: HoverFormat,
    sink: Arc<dyn NotificationSink>,
    directory: Arc<dyn RecipientDirectory>,
    audience: Mutex<BTreeMap<MemberId, bool>>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        plugin: impl Into<String>,
        permission: Option<String>,
        sink: Arc<dyn NotificationSink>,
        directory: Arc<dyn RecipientDirectory>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            permission: permission.filter(|permission| !permission.trim().is_empty()),
            hover_format: HoverFormat::Content,
            sink,
            directory,
            audience: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn with_host(mut self, hover_format: HoverFormat) -> Self {
        self.hover_format = hover_format;
        self
    }

    fn is_permitted(&self, member: &MemberId) -> bool {
        self.permission
            .as_deref()
            .is_none_or(|permission| self.directory.has_permission(member, permission))
    }

    /// Rebuild the audience from the directory. Returns how many members are
    /// permitted.
    pub fn refresh_audience(&self) -> usize {
        let members: BTreeMap<MemberId, bool> = self
            .directory
            .online()
            .into_iter()
            .map(|id| {
                let permitted = self.is_permitted(&id);
                (id, permitted)
            })
            .collect();
        let permitted = members.values().filter(|permitted| **permitted).count();
        *self.audience.lock().unwrap_or_else(PoisonError::into_inner) = members;
        permitted
    }

    #[must_use]
    pub fn audience(&self) -> Vec<AudienceMember> {
        self.audience
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, permitted)| AudienceMember {
                id: id.clone(),
                permitted: *permitted,
            })
            .collect()
    }

    fn permitted_members(&self) -> Vec<MemberId> {
        self.audience
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, permitted)| **permitted)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn messages<'a>(&'a self, state: &'a UpdateState) -> Messages<'a> {
        Messages {
            plugin: &self.plugin,
            state,
            hover_format: self.hover_format,
        }
    }

    pub fn dispatch(&self, audience: Audience, outcome: &PassOutcome, state: &UpdateState) {
        let messages = self.messages(state);

        if matches!(audience, Audience::All | Audience::Console)
            && let Some(notification) = messages.render(outcome, Channel::Console)
        {
            self.sink.deliver(&Recipient::Console, &notification);
        }

        if matches!(audience, Audience::All | Audience::Members)
            && let Some(notification) = messages.render(outcome, Channel::Member)
        {
            let members = self.permitted_members();
            debug!("Notifying {} audience member(s)", members.len());
            for member in members {
                self.sink.deliver(&Recipient::Member(member), &notification);
            }
        }
    }

    /// Add or refresh `member`. Delivers the pending notification when an
    /// update is available and the member is permitted; returns whether it
    /// did.
    pub fn member_joined(&self, member: MemberId, state: &UpdateState) -> bool {
        let permitted = self.is_permitted(&member);
        self.audience
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(member.clone(), permitted);

        if !permitted || state.result != UpdateResult::UpdateAvailable {
            return false;
        }

        let notification = self
            .messages(state)
            .for_result(UpdateResult::UpdateAvailable, Channel::Member);
        self.sink.deliver(&Recipient::Member(member), &notification);
        true
    }

    pub fn member_left(&self, member: &MemberId) -> bool {
        self.audience
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(member)
            .is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use beacon_core::{Release, Version};
    use beacon_platform::HoverFormat;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex, PoisonError};

    use super::{
        Audience, MemberId, Notification, NotificationDispatcher, NotificationSink, Recipient,
        RecipientDirectory,
    };
    use crate::schedule::Ticks;
    use crate::state::{
        ActiveRelease, PassFailure, PassOutcome, UpdateResult, UpdateState, UpdaterSettings,
    };

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) delivered: Mutex<Vec<(Recipient, Notification)>>,
    }

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<(Recipient, Notification)> {
            std::mem::take(&mut *self.delivered.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    impl NotificationSink for RecordingSink {
        fn deliver(&self, recipient: &Recipient, notification: &Notification) {
            self.delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((recipient.clone(), notification.clone()));
        }
    }

    #[derive(Default)]
    pub(crate) struct StaticDirectory {
        pub(crate) online: Vec<MemberId>,
        pub(crate) permitted: HashSet<MemberId>,
    }

    impl RecipientDirectory for StaticDirectory {
        fn online(&self) -> Vec<MemberId> {
            self.online.clone()
        }

        fn has_permission(&self, member: &MemberId, _permission: &str) -> bool {
            self.permitted.contains(member)
        }
    }

    fn directory() -> Arc<StaticDirectory> {
        Arc::new(StaticDirectory {
            online: vec!["alex".into(), "sam".into()],
            permitted: HashSet::from(["alex".into()]),
        })
    }

    fn available_state() -> UpdateState {
        let settings = UpdaterSettings {
            interval: Ticks::new(20).expect("non-zero"),
            enabled: true,
            allow_unstable: false,
            allow_download: false,
            permission: Some("example.updates".into()),
            globally_enabled: true,
        };
        let mut state = UpdateState::new(Version::parse("1.0"), settings);
        state.latest_version = Version::parse("1.2");
        state.result = UpdateResult::UpdateAvailable;
        state.active = Some(ActiveRelease {
            index: 0,
            provider: "Spigot".into(),
            release: Release::new(Version::parse("1.2"))
                .with_download_link("https://example.com/dl")
                .with_changelog_link("https://example.com/changes"),
        });
        state
    }

    fn dispatcher(
        permission: Option<&str>,
        sink: &Arc<RecordingSink>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(
            "Example",
            permission.map(str::to_string),
            Arc::clone(sink) as Arc<dyn NotificationSink>,
            directory(),
        )
    }

    #[test]
    fn console_gets_banner_and_permitted_members_get_prompt() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(Some("example.updates"), &sink);
        assert_eq!(dispatcher.refresh_audience(), 1);

        let state = available_state();
        dispatcher.dispatch(
            Audience::All,
            &PassOutcome::Completed(UpdateResult::UpdateAvailable),
            &state,
        );

        let delivered = sink.take();
        assert_eq!(delivered.len(), 2);

        let (recipient, banner) = &delivered[0];
        assert_eq!(recipient, &Recipient::Console);
        assert_eq!(banner.lines[0], "*".repeat(60));
        assert_eq!(banner.lines[1], "Version (1.2) is now available for Example.");
        assert_eq!(banner.lines[2], "Download: https://example.com/dl");
        assert_eq!(banner.lines[3], "Changelog: https://example.com/changes");
        assert_eq!(banner.lines.len(), 5);

        let (recipient, prompt) = &delivered[1];
        assert_eq!(recipient, &Recipient::Member("alex".into()));
        assert_eq!(
            prompt.hover.as_deref(),
            Some("Example v1.0 -> v1.2\nClick here to download update")
        );
        assert_eq!(prompt.link.as_deref(), Some("https://example.com/dl"));
    }

    #[test]
    fn missing_permission_makes_everyone_eligible() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(None, &sink);
        assert_eq!(dispatcher.refresh_audience(), 2);

        dispatcher.dispatch(
            Audience::Members,
            &PassOutcome::Completed(UpdateResult::Latest),
            &available_state(),
        );
        let recipients: Vec<_> = sink.take().into_iter().map(|(r, _)| r).collect();
        assert_eq!(
            recipients,
            vec![Recipient::Member("alex".into()), Recipient::Member("sam".into())]
        );
    }

    #[test]
    fn console_audience_skips_members() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(None, &sink);
        dispatcher.refresh_audience();

        dispatcher.dispatch(
            Audience::Console,
            &PassOutcome::Failed(PassFailure::AllProvidersFailed { count: 2 }),
            &available_state(),
        );
        let delivered = sink.take();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, Recipient::Console);
        assert!(delivered[0].1.lines[0].contains("all 2 providers failed"));
    }

    #[test]
    fn skipped_pass_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(None, &sink);
        dispatcher.refresh_audience();
        dispatcher.dispatch(Audience::All, &PassOutcome::Skipped, &available_state());
        assert!(sink.take().is_empty());
    }

    #[test]
    fn late_joiner_receives_pending_update_only_when_permitted() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(Some("example.updates"), &sink);
        let state = available_state();

        assert!(dispatcher.member_joined("alex".into(), &state));
        assert!(!dispatcher.member_joined("sam".into(), &state));

        let delivered = sink.take();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, Recipient::Member("alex".into()));

        let mut latest = state;
        latest.result = UpdateResult::Latest;
        assert!(!dispatcher.member_joined("alex".into(), &latest));

        assert!(dispatcher.member_left(&"alex".into()));
        assert!(!dispatcher.member_left(&"alex".into()));
        assert_eq!(dispatcher.audience().len(), 1);
    }

    #[test]
    fn prompt_without_download_link_points_at_changelog() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(None, &sink).with_host(HoverFormat::LegacyText);
        let mut state = available_state();
        if let Some(active) = state.active.as_mut() {
            active.release.download_link = None;
        }

        dispatcher.member_joined("sam".into(), &state);
        let delivered = sink.take();
        let prompt = &delivered[0].1;
        assert_eq!(prompt.link.as_deref(), Some("https://example.com/changes"));
        assert!(prompt.hover.as_deref().is_some_and(|h| h.ends_with("to view update")));
        assert_eq!(prompt.hover_format, HoverFormat::LegacyText);
    }
}
