use std::path::Path;

use id3::{ErrorKind, Tag, TagLike, Version};

pub(crate) const PODCAST_GENRE: &str = "Podcast";
pub(crate) const TAG_VERSION: Version = Version::Id3v23;

/// Sets the show, genre and track frames on `path`, keeping any other frames
/// already present, and saves the tag as ID3v2.3.
pub(crate) fn tag_episode(path: &Path, show_name: &str, track: usize) -> Result<(), id3::Error> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(err) if matches!(err.kind, ErrorKind::NoTag) => Tag::new(),
        Err(err) => return Err(err),
    };

    tag.set_album(show_name);
    tag.set_artist(show_name);
    tag.set_album_artist(show_name);
    tag.set_genre(PODCAST_GENRE);
    tag.set_text("TRCK", track.to_string());

    tag.write_to_path(path, TAG_VERSION)
}
