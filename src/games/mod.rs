//! Game Modules
//!
//! Each module implements [`crate::engine::GameDefinition`] for one game.
//!
//! | Module      | Members | Pacing                                   |
//! |-------------|---------|------------------------------------------|
//! | `chess`     | 2       | one move each, resolved together         |
//! | `hearts`    | 3-5     | passing rounds, then one seat per trick  |
//! | `naval`     | 2-4     | deployment, then simultaneous salvos     |
//! | `territory` | 2-6     | simultaneous deployments, power battles  |
//! | `tiles`     | 2-4     | simultaneous runs, bag draws             |
//! | `words`     | 1-8     | simultaneous guesses at one secret word  |

pub mod chess;
pub mod hearts;
pub mod naval;
pub mod territory;
pub mod tiles;
pub mod words;

pub use chess::Chess;
pub use hearts::Hearts;
pub use naval::Naval;
pub use territory::Territory;
pub use tiles::Tiles;
pub use words::Words;
