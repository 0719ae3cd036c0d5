mod bukkit;
mod github;
mod hangar;
mod polymart;
mod spiget;
mod spigot;

pub use bukkit::BukkitProvider;
pub use github::{GitHubAsset, GitHubProvider, GitHubRelease};
pub use hangar::{HangarPlatform, HangarProvider};
pub use polymart::PolymartProvider;
pub use spiget::SpigetProvider;
pub use spigot::SpigotProvider;
