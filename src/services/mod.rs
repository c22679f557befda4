pub(crate) mod ai_assistant;
pub(crate) mod scoring;
pub(crate) mod share_codes;
