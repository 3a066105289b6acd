//! Study sessions.
//!
//! [`SessionState`] is the pure state machine: idle, selecting, presenting a
//! quiz, or showing feedback after a failure. [`StudySession`] drives it with
//! the scheduler, grades answers through [`Quiz`], and records reviews.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recall_core::session::{Answer, StudySession};
//!
//! let mut session = StudySession::builder(graph, store).open().await?;
//! session.learn_all().await?;
//! session.start().await?;
//! if let Some(quiz) = session.quiz() {
//!     let answer = if quiz.expects_text() {
//!         Answer::Text(read_line()?)
//!     } else {
//!         Answer::Binary(true)
//!     };
//!     session.answer(answer).await?;
//! }
//! session.close();
//! ```

mod driver;
mod quiz;
mod state;

pub use driver::{SessionBuilder, StudySession};
pub use quiz::{normalize_reading, Answer, Quiz, BLANK};
pub use state::{SessionAction, SessionState};
