#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod difficulty;
mod error;
mod exercise;
mod history;
mod progression;
mod selector;
mod service;
mod session;
mod settings;
mod stash;
mod title;

pub use difficulty::*;
pub use error::*;
pub use exercise::*;
pub use history::*;
pub use progression::*;
pub use selector::*;
pub use service::*;
pub use session::*;
pub use settings::*;
pub use stash::*;
pub use title::*;
