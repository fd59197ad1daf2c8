//! Community ban votes
//!
//! When an actor's total reaches the terminal threshold, the community votes
//! on a ban for a fixed window. The lifecycle is
//!
//! ```text
//! Idle ──open──▶ Open ──window elapsed──▶ Resolved(Banned | Reprieved)
//! ```
//!
//! - One open vote per actor; opening a second yields [`Error::Conflict`](crate::Error::Conflict)
//! - Bots and the actor under vote are not counted
//! - A voter may change their mind; the latest ballot counts
//! - Yes must strictly outnumber no, so ties reprieve
//! - Resolution is terminal: resolving again returns the stored outcome

mod coordinator;
mod types;

pub use coordinator::{BanVoteCoordinator, DEFAULT_VOTE_WINDOW_SECS};
pub use types::{
    Ballot, BallotReceipt, BanVote, Resolution, Tally, VoteOutcome, VoteStatus, Voter,
};
