//! Static model price table (USD per million tokens)

/// Input and output prices per million tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

impl ModelPrice {
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input
            + (output_tokens as f64 / 1_000_000.0) * self.output
    }
}

/// Keys are matched case-insensitively as substrings of the model name.
pub const PRICING: &[(&str, ModelPrice)] = &[
    ("Claude Sonnet 4.5", ModelPrice::new(3.00, 15.00)),
    ("Sonnet 4.5", ModelPrice::new(3.00, 15.00)),
    ("Claude Sonnet 4", ModelPrice::new(3.00, 15.00)),
    ("Sonnet 4", ModelPrice::new(3.00, 15.00)),
    ("Claude Sonnet 3.5", ModelPrice::new(3.00, 15.00)),
    ("Sonnet 3.5", ModelPrice::new(3.00, 15.00)),
    ("Claude Opus", ModelPrice::new(15.00, 75.00)),
    ("Opus", ModelPrice::new(15.00, 75.00)),
    ("Claude Haiku", ModelPrice::new(0.25, 1.25)),
    ("Haiku", ModelPrice::new(0.25, 1.25)),
    ("GPT-4", ModelPrice::new(30.00, 60.00)),
    ("GPT-4 Turbo", ModelPrice::new(10.00, 30.00)),
    ("GPT-3.5", ModelPrice::new(0.50, 1.50)),
];

/// Price for `model_name`: the longest matching key wins, ties go to the
/// earlier table entry.
pub fn lookup(model_name: &str) -> Option<ModelPrice> {
    let name = model_name.to_lowercase();
    let mut best: Option<(&str, ModelPrice)> = None;

    for &(key, price) in PRICING {
        if !name.contains(&key.to_lowercase()) {
            continue;
        }
        match best {
            Some((current, _)) if current.len() >= key.len() => {}
            _ => best = Some((key, price)),
        }
    }

    best.map(|(_, price)| price)
}
