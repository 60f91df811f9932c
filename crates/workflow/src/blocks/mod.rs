//! Built-in blocks used by the system workflows.

mod chat;
mod dice;
mod gacha;
mod memory;
mod text;

pub use {
    chat::{ChatCompletion, PromptBuilder},
    dice::{DiceRoll, DiceSpec},
    gacha::{GachaDraw, Rarity},
    memory::{ChatMemoryQuery, ChatMemoryStore},
    text::StaticText,
};
