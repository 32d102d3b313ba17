//! Configuration section definitions.
//!
//! Each module corresponds to a section in `puzzle.toml`:
//!
//! | Module    | TOML Section                     | Purpose                     |
//! |-----------|----------------------------------|-----------------------------|
//! | `serve`   | `[serve]`                        | HTTP server                 |
//! | `assets`  | `[assets]`                       | Page-wide scripts and css   |
//! | `page`    | `[[page]]`                       | Routed page templates       |
//! | `gateway` | `[gateway.<Name>.fragments.<f>]` | Upstream fragments          |

mod assets;
mod gateway;
mod page;
mod serve;

pub use assets::AssetsConfig;
pub use gateway::{FragmentSection, GatewaySection};
pub use page::PageSection;
pub use serve::ServeConfig;
