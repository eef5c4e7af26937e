use super::types::{SearchResults, SourceId, Track};
use std::collections::HashMap;

/// Combine per-source search results into one aggregate.
///
/// `per_source` must be in fan-out order. Every entry is retagged with the
/// source it came from. Songs sharing a merge key collapse into the first one
/// seen; later duplicates only add their source to `available_sources`.
/// Albums and artists are concatenated as-is.
pub fn merge_search_results(per_source: Vec<(SourceId, SearchResults)>) -> SearchResults {
    let mut merged = SearchResults::default();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (source, results) in per_source {
        for song in results.songs {
            let song = tag_song(song, &source);
            match by_key.get(&song.merge_key()) {
                Some(&idx) => {
                    let existing = &mut merged.songs[idx];
                    for (tag, id) in song.source_ids {
                        existing.source_ids.entry(tag).or_insert(id);
                    }
                    for tag in song.available_sources {
                        if !existing.available_sources.contains(&tag) {
                            existing.available_sources.push(tag);
                        }
                    }
                }
                None => {
                    by_key.insert(song.merge_key(), merged.songs.len());
                    merged.songs.push(song);
                }
            }
        }

        merged
            .albums
            .extend(results.albums.into_iter().map(|mut a| {
                a.source = source.clone();
                a
            }));
        merged
            .artists
            .extend(results.artists.into_iter().map(|mut a| {
                a.source = source.clone();
                a
            }));
    }

    merged
}

fn tag_song(mut song: Track, source: &SourceId) -> Track {
    song.source = source.clone();
    song.source_ids.insert(source.clone(), song.id.clone());
    if !song.available_sources.contains(source) {
        song.available_sources.insert(0, source.clone());
    }
    song
}
