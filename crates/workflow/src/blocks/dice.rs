use std::{fmt, sync::Mutex};

use {
    anyhow::anyhow,
    async_trait::async_trait,
    rand::{Rng, SeedableRng, rngs::StdRng},
    regex::Regex,
};

use crate::{
    block::{Block, BlockInputs},
    port::{Port, PortType, PortValue, PortValues},
};

const MAX_DICE: u64 = 100;
const MAX_SIDES: u64 = 1000;

/// An `NdM` roll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceSpec {
    pub count: u64,
    pub sides: u64,
}

impl Default for DiceSpec {
    fn default() -> Self {
        Self { count: 1, sides: 6 }
    }
}

impl DiceSpec {
    pub fn in_range(&self) -> bool {
        (1..=MAX_DICE).contains(&self.count) && (2..=MAX_SIDES).contains(&self.sides)
    }
}

impl fmt::Display for DiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

/// Rolls the first `NdM` found in the message (`1d6` when there is none).
///
/// Input `msg`, outputs `reply` and `total`.
pub struct DiceRoll {
    pattern: Regex,
    rng: Mutex<StdRng>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl DiceRoll {
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_rng(StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic rolls, for tests and replays.
    pub fn seeded(seed: u64) -> Result<Self, regex::Error> {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"(?i)\b(\d*)d(\d+)\b")?,
            rng: Mutex::new(rng),
            inputs: vec![Port::required("msg", PortType::Message, "roll request")],
            outputs: vec![
                Port::required("reply", PortType::Text, "rolls and their sum"),
                Port::required("total", PortType::Integer, "sum of the rolls"),
            ],
        })
    }

    pub fn parse(&self, text: &str) -> DiceSpec {
        let Some(caps) = self.pattern.captures(text) else {
            return DiceSpec::default();
        };
        let number = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        let count = match number(1) {
            "" => 1,
            n => n.parse().unwrap_or(u64::MAX),
        };
        DiceSpec {
            count,
            sides: number(2).parse().unwrap_or(u64::MAX),
        }
    }

    fn roll(&self, spec: DiceSpec) -> anyhow::Result<Vec<u64>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow!("dice generator lock poisoned"))?;
        Ok((0..spec.count)
            .map(|_| rng.random_range(1..=spec.sides))
            .collect())
    }
}

#[async_trait]
impl Block for DiceRoll {
    fn kind(&self) -> &str {
        "dice_roll"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
        let msg = inputs.message("msg")?;
        let spec = self.parse(&msg.text);

        let (reply, total) = if spec.in_range() {
            let rolls = self.roll(spec)?;
            let total: u64 = rolls.iter().sum();
            let listed = rolls
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            (
                format!("{} rolled {spec}: [{listed}] = {total}", msg.display_name()),
                i64::try_from(total)?,
            )
        } else {
            (
                format!(
                    "can't roll {spec}: use 1-{MAX_DICE} dice with 2-{MAX_SIDES} sides"
                ),
                0,
            )
        };

        Ok(PortValues::from([
            ("reply".to_string(), PortValue::Text(reply)),
            ("total".to_string(), PortValue::Integer(total)),
        ]))
    }
}
