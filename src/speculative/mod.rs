//! Speculative decoding.
//!
//! A cheap draft scorer guesses ahead; an expensive target scorer checks
//! the guesses in one call. Rejection sampling decides how many guesses
//! survive, and the output keeps exactly the target's distribution.
//!
//! ## One iteration
//!
//! ```text
//! committed: [x0 .. xn]
//!
//!   draft    x̃1 ~ p(·|x..n)   x̃2 ~ p(·|x..n x̃1)   ...   x̃K
//!   score    p rows, q rows over [x0 .. xn x̃1 .. x̃K]   (1 call each)
//!   verify   x̃1 ✓   x̃2 ✓   x̃3 ✗ → resample from (q - p)+
//!   commit   [x0 .. xn x̃1 x̃2 y3]
//! ```
//!
//! If all K guesses pass, one extra token is drawn from the target row
//! after the last guess, so an iteration commits between 1 and K+1 tokens.
//!
//! ## Modules
//!
//! - [`config`]: draft/target selection and K
//! - [`state`]: the per-iteration state machine
//! - [`sampler`]: the accept/reject/resample rule
//! - [`engine`]: the outer loop with budget clamping
//! - [`stats`]: counters and derived rates

pub mod config;
pub mod engine;
pub mod sampler;
pub mod state;
pub mod stats;

pub use config::SpeculativeConfig;
pub use engine::SpeculativeDecoder;
pub use sampler::{acceptance_probability, FinalToken, RejectionSampler, Verification};
pub use state::{Phase, SpeculativeStep};
pub use stats::DecodeStats;
