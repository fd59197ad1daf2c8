//! Sentinel Core - Progressive Discipline Engine
//!
//! This crate decides how a community responds to reported misbehavior,
//! including:
//! - Classifier: Mapping free-text reasons to point values
//! - Ledger: Per-actor point grants with time-based decay
//! - Escalation: Turning totals into mutes or a ban vote
//! - Advisory: The three-step warning track
//! - Ban votes: Timed community votes with majority resolution
//! - Orchestrator: One report in, one structured outcome out
//! - Enforcement: Applying outcomes through platform adapters
//!
//! The engine knows nothing about any chat platform. Adapters implement
//! [`Enforcer`], [`Notifier`] and [`ReasonSource`] and subscribe to the
//! [`EventBus`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod advisory;
pub mod authz;
pub mod ban_vote;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod enforcement;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod event_bus;
pub mod humanize;
pub mod intake;
pub mod ledger;
pub mod orchestrator;
pub mod store;

pub use advisory::{AdvisoryConfig, AdvisoryState, AdvisoryStep, AdvisoryTracker};
pub use authz::RoleHierarchy;
pub use ban_vote::{
    Ballot, BallotReceipt, BanVote, BanVoteCoordinator, Resolution, Tally, VoteOutcome,
    VoteStatus, Voter,
};
pub use classifier::{Classification, Classifier, OffenseLevel, OffenseTable};
pub use clock::{
    Clock, ManualClock, ManualScheduler, ScheduledHandle, Scheduler, SystemClock, TokioScheduler,
};
pub use config::DisciplineConfig;
pub use enforcement::{EnforcementDispatcher, EnforcementReport, Enforcer, Notifier};
pub use engine::{DisciplineEngine, DisciplineEngineBuilder};
pub use error::{format_error_for_chat, Error, Result, UserFriendlyError};
pub use escalation::{Action, DurationRule, EscalationConfig, EscalationPolicy};
pub use event_bus::{DisciplineEvent, EventBus};
pub use intake::{collect_reason, IntakeResult, ReasonSource};
pub use ledger::{ActorKey, AdvisoryWarning, Ledger, PointGrant};
pub use orchestrator::{
    AdvisoryProgress, MessageContext, Outcome, OutcomeAction, PunishmentOrchestrator, Report,
    Standing,
};
pub use store::{LedgerStore, MemoryStore, SqliteStore, VoteStore};
