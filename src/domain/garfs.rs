//! Filename-derived garf attributes.
//!
//! A garf has no identity beyond its filename; extension and kind are
//! computed on demand, never stored.

/// Lower-cased extension of a garf name: the substring after the last `.`,
/// or an empty string when the name has no dot.
pub fn extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// How a garf should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarfKind {
    Image,
    Video,
}

impl GarfKind {
    /// Videos are mp4/webm; everything else renders as an image.
    pub fn from_name(name: &str) -> Self {
        match extension(name).as_str() {
            "mp4" | "webm" => GarfKind::Video,
            _ => GarfKind::Image,
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, GarfKind::Video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_tail() {
        assert_eq!(extension("garf.JPG"), "jpg");
        assert_eq!(extension("archive.tar.gz"), "gz");
        assert_eq!(extension("noext"), "");
        assert_eq!(extension("trailing."), "");
    }

    #[test]
    fn kind_follows_extension() {
        assert_eq!(GarfKind::from_name("a.mp4"), GarfKind::Video);
        assert_eq!(GarfKind::from_name("a.WEBM"), GarfKind::Video);
        assert_eq!(GarfKind::from_name("a.jpg"), GarfKind::Image);
        assert_eq!(GarfKind::from_name("plain"), GarfKind::Image);
    }
}
