//! Fingerprinting & Sanitization (C1).
//!
//! Maps artist/show identifiers and titles to stable, filesystem-safe folder
//! and file names. Pure and deterministic: the same inputs must yield the
//! same name on every platform so existence checks stay stable (§4.1).

use crate::warning;

const RESERVED: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const ALBUM_FOLDER_MAX_RUNES: usize = 120;
const VIDEO_FILENAME_MAX_RUNES: usize = 110;

/// Replaces filesystem-reserved characters with a space, collapses repeated
/// whitespace, and trims the ends.
pub fn sanitize(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { ' ' } else { c })
        .collect();

    let mut out = String::with_capacity(replaced.len());
    let mut last_was_space = false;
    for c in replaced.trim().chars() {
        if c == ' ' {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// Truncates by **rune count** (Unicode scalar values), not byte length, and
/// warns once if truncation actually occurred.
fn truncate_runes(input: &str, max_runes: usize, context: &str) -> String {
    let rune_count = input.chars().count();
    if rune_count <= max_runes {
        return input.to_string();
    }
    warning!(
        "{} name truncated from {} to {} characters",
        context,
        rune_count,
        max_runes
    );
    input.chars().take(max_runes).collect()
}

/// `sanitize(ArtistName) + " - " + sanitize(rtrim(ContainerInfo))`,
/// rune-truncated to 120.
pub fn album_folder_name(artist_name: &str, container_info: &str) -> String {
    let artist = sanitize(artist_name);
    let title = sanitize(container_info.trim_end());
    let combined = format!("{artist} - {title}");
    truncate_runes(&combined, ALBUM_FOLDER_MAX_RUNES, "Album folder")
}

/// Video filenames follow the same sanitize rule but a tighter 110-rune cap.
pub fn video_file_stem(artist_name: &str, container_info: &str) -> String {
    let artist = sanitize(artist_name);
    let title = sanitize(container_info.trim_end());
    let combined = format!("{artist} - {title}");
    truncate_runes(&combined, VIDEO_FILENAME_MAX_RUNES, "Video file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_characters_with_space() {
        assert_eq!(sanitize("AC/DC: Back in Black?"), "AC DC Back in Black");
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(sanitize("  Billy   Strings  "), "Billy Strings");
    }

    #[test]
    fn folder_name_is_deterministic_and_well_formed() {
        let a = album_folder_name("Billy Strings", "Red Rocks 2023-07-14");
        let b = album_folder_name("Billy Strings", "Red Rocks 2023-07-14");
        assert_eq!(a, b);
        assert_eq!(a, "Billy Strings - Red Rocks 2023-07-14");
    }

    #[test]
    fn truncates_by_rune_count_not_bytes() {
        let cjk_title: String = std::iter::repeat('字').take(200).collect();
        let folder = album_folder_name("A", &cjk_title);
        assert!(folder.chars().count() <= ALBUM_FOLDER_MAX_RUNES);
        assert!(folder.chars().all(|c| c.len_utf8() > 0));
    }
}
