pub mod cue;
pub mod cue_executor;
pub mod cue_list;
