//! Query resolution - task language stripping, printed page lookup and answer composition

pub mod answer_composer;
pub mod page_locator;
pub mod task_language;

pub use answer_composer::{citations, no_information_message, system_prompt, AnswerComposer};
pub use page_locator::{no_content_message, PageLocator, PageLookup};
pub use task_language::strip_task_language;
