//! Doorman, a Telegram group moderation bot.
//!
//! Greets new members with a challenge prompt and mutes those who fail to
//! answer in time, filters messages against a configurable blacklist, and
//! exposes reply-targeted admin commands (mute, ban, pin, promote, bulk
//! delete).
//!
//! Pending verifications are memory-only; a restart drops them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod gateway;
pub mod logging;
pub mod moderation;
pub mod telegram;
pub mod verify;
