use std::{fmt, sync::Mutex};

use {
    anyhow::anyhow,
    async_trait::async_trait,
    rand::{
        SeedableRng,
        distr::{Distribution, weighted::WeightedIndex},
        rngs::StdRng,
    },
    regex::Regex,
};

use crate::{
    block::{Block, BlockInputs},
    port::{Port, PortType, PortValue, PortValues},
};

const MAX_PULLS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        })
    }
}

/// Weights in permille.
const DROP_TABLE: [(Rarity, u32); 4] = [
    (Rarity::Common, 790),
    (Rarity::Rare, 170),
    (Rarity::Epic, 36),
    (Rarity::Legendary, 4),
];

/// Weighted draws from a fixed rarity table. The first number in the message
/// is the pull count (1 when absent, at most 10).
///
/// Input `msg`, outputs `reply` and `best` (rank of the rarest pull, 0 for
/// common).
pub struct GachaDraw {
    count: Regex,
    weights: WeightedIndex<u32>,
    rng: Mutex<StdRng>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl GachaDraw {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_rng(StdRng::from_rng(&mut rand::rng()))
    }

    pub fn seeded(seed: u64) -> anyhow::Result<Self> {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> anyhow::Result<Self> {
        Ok(Self {
            count: Regex::new(r"\b(\d+)\b")?,
            weights: WeightedIndex::new(DROP_TABLE.iter().map(|(_, w)| *w))?,
            rng: Mutex::new(rng),
            inputs: vec![Port::required("msg", PortType::Message, "pull request")],
            outputs: vec![
                Port::required("reply", PortType::Text, "pulled items"),
                Port::required("best", PortType::Integer, "rank of the rarest pull"),
            ],
        })
    }

    /// `None` when the requested count is outside 1..=10.
    pub fn pulls(&self, text: &str) -> Option<u32> {
        let Some(caps) = self.count.captures(text) else {
            return Some(1);
        };
        let n = caps[1].parse::<u32>().ok()?;
        (1..=MAX_PULLS).contains(&n).then_some(n)
    }

    fn draw(&self, pulls: u32) -> anyhow::Result<Vec<Rarity>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow!("gacha generator lock poisoned"))?;
        Ok((0..pulls)
            .map(|_| DROP_TABLE[self.weights.sample(&mut *rng)].0)
            .collect())
    }
}

#[async_trait]
impl Block for GachaDraw {
    fn kind(&self) -> &str {
        "gacha_draw"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    async fn execute(&self, inputs: BlockInputs) -> anyhow::Result<PortValues> {
        let msg = inputs.message("msg")?;

        let (reply, best) = match self.pulls(&msg.text) {
            Some(pulls) => {
                let drawn = self.draw(pulls)?;
                let best = drawn.iter().max().copied().unwrap_or(Rarity::Common);
                let listed = drawn
                    .iter()
                    .map(Rarity::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("{} pulled {pulls}: [{listed}], best {best}", msg.display_name()),
                    best as i64,
                )
            },
            None => (format!("can't pull that many: use 1-{MAX_PULLS} pulls"), 0),
        };

        Ok(PortValues::from([
            ("reply".to_string(), PortValue::Text(reply)),
            ("best".to_string(), PortValue::Integer(best)),
        ]))
    }
}
