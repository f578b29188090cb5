use std::fmt::Display;

/// String metadata slots a container may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagSlot {
    Title,
    Copyright,
    Software,
    Artist,
    Comment,
    Date,
    Album,
    License,
    TrackNumber,
    Genre,
}

impl TagSlot {
    /// Every slot, in the order tags are copied.
    pub const ALL: [TagSlot; 10] = [
        TagSlot::Title,
        TagSlot::Copyright,
        TagSlot::Software,
        TagSlot::Artist,
        TagSlot::Comment,
        TagSlot::Date,
        TagSlot::Album,
        TagSlot::License,
        TagSlot::TrackNumber,
        TagSlot::Genre,
    ];
}

impl Display for TagSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TagSlot::Title => "title",
            TagSlot::Copyright => "copyright",
            TagSlot::Software => "software",
            TagSlot::Artist => "artist",
            TagSlot::Comment => "comment",
            TagSlot::Date => "date",
            TagSlot::Album => "album",
            TagSlot::License => "license",
            TagSlot::TrackNumber => "track number",
            TagSlot::Genre => "genre",
        };
        f.write_str(name)
    }
}
