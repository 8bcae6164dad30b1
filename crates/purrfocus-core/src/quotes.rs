use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub text: &'static str,
    pub author: &'static str,
}

pub const QUOTES: &[Quote] = &[
    Quote {
        text: "The only way to do great work is to love what you do.",
        author: "Steve Jobs",
    },
    Quote {
        text: "Success is not final, failure is not fatal: it is the courage to continue that counts.",
        author: "Winston Churchill",
    },
    Quote {
        text: "Don't watch the clock; do what it does. Keep going.",
        author: "Sam Levenson",
    },
    Quote {
        text: "The future depends on what you do today.",
        author: "Mahatma Gandhi",
    },
    Quote {
        text: "Your time is limited, don't waste it living someone else's life.",
        author: "Steve Jobs",
    },
    Quote {
        text: "Focus on being productive instead of busy.",
        author: "Tim Ferriss",
    },
    Quote {
        text: "The way to get started is to quit talking and begin doing.",
        author: "Walt Disney",
    },
    Quote {
        text: "Small progress is still progress.",
        author: "Anonymous",
    },
    Quote {
        text: "Done is better than perfect.",
        author: "Sheryl Sandberg",
    },
    Quote {
        text: "Your companion believes in you! Keep going!",
        author: "purrfocus",
    },
];

/// Pick a quote, shown again after each phase change.
pub fn random_quote<R: Rng + ?Sized>(rng: &mut R) -> Quote {
    QUOTES.choose(rng).copied().unwrap_or(QUOTES[0])
}

pub fn quote_of_the_moment() -> Quote {
    random_quote(&mut rand::thread_rng())
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" - {}", self.text, self.author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_quote_comes_from_the_list() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let q = random_quote(&mut rng);
            assert!(QUOTES.contains(&q));
        }
    }

    #[test]
    fn display_includes_author() {
        assert!(QUOTES[0].to_string().ends_with("- Steve Jobs"));
    }
}
