pub mod scene;
mod scene_store;
