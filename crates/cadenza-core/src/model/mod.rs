mod ids;
mod result;
mod song;

pub use ids::SongId;
pub use result::SearchResult;
pub use song::Song;
