//! Configuration for tilehoard.
//!
//! A single JSON file lists the upstream servers, the named regions and the
//! download settings:
//!
//! ```json
//! {
//!   "settings": { "output_dir": "tiles", "concurrency": 8 },
//!   "servers": [
//!     { "name": "osm", "url": "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
//!       "headers": { "User-Agent": "tilehoard/0.1" } }
//!   ],
//!   "regions": {
//!     "qatar": { "bbox": [50.0, 24.4, 52.0, 26.2], "min_zoom": 5, "max_zoom": 12,
//!                "description": "Qatar peninsula" }
//!   }
//! }
//! ```
//!
//! [`ConfigFile::validate`] turns the raw file into a [`ValidatedConfig`].

pub mod defaults;
mod file;
mod region;
mod settings;

pub use file::{
    resolve_config_path, ConfigError, ConfigFile, RegionConfig, ServerConfig, ValidatedConfig,
};
pub use region::Region;
pub use settings::DownloadSettings;
