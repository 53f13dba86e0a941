// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Accumulation of highlight spans produced by the full-text scorer.
//!
//! An [`AreaHolder`] collects match positions per field while documents are scored, then
//! hands normalized spans to the snippet extractor at result-materialization time. The
//! holder is either dirty or committed: any mutation marks it dirty, and every read commits
//! it first, so readers always observe sorted, pairwise-disjoint spans.

/// Maximum highlighted areas kept per field in each result.
pub const MAX_AREAS_IN_RESULT: usize = 5;

/// A span of character positions within a document's text.
///
/// Both ends are signed: snippet window expansion produces negative intermediates before
/// clamping, and the tri-gram position mapping can run past either end of the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Area {
    pub start: i32,
    pub end: i32,
}

impl Area {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Absorbs `other` if the closures of the two spans intersect; returns whether it did.
    fn concat(&mut self, other: Area) -> bool {
        if self.start.max(other.start) > self.end.min(other.end) {
            return false;
        }
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        true
    }
}

/// Per-field accumulator of highlight [`Area`]s.
///
/// Fields are addressed by zero-based index and the field list grows on demand. Insertion
/// first tries to extend the last span of the field; only a span that cannot be merged
/// counts against the per-field cap of [`MAX_AREAS_IN_RESULT`].
///
/// The `buffer_size`/`space_size`/`total_size` geometry describes the padded buffer the
/// tri-gram indexer reports positions in; see [`AreaHolder::add_trigram`].
#[derive(Clone, Debug, Default)]
pub struct AreaHolder {
    areas: Vec<Vec<Area>>,
    committed: bool,
    buffer_size: i32,
    space_size: i32,
    total_size: i32,
}

impl AreaHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a holder that can map tri-gram positions back to document coordinates.
    pub fn with_trigram_geometry(buffer_size: i32, space_size: i32, total_size: i32) -> Self {
        Self {
            buffer_size,
            space_size,
            total_size,
            ..Self::default()
        }
    }

    /// Hints the expected number of fields.
    pub fn reserve(&mut self, fields: usize) {
        self.committed = false;
        self.areas.reserve(fields);
    }

    /// Sizes the field list to exactly `fields` empty per-field lists.
    pub fn reserve_fields(&mut self, fields: usize) {
        self.committed = false;
        self.areas.resize(fields, Vec::new());
    }

    /// Adds the span of a word match. Returns `false` only if the field already holds
    /// [`MAX_AREAS_IN_RESULT`] spans and the new one cannot be merged into the last.
    pub fn add_word(&mut self, start: i32, len: i32, field: usize) -> bool {
        self.insert_area(Area::new(start, start + len), field)
    }

    /// Adds the span of a tri-gram match reported at position `pos` of the padded buffer.
    ///
    /// The mapping depends on which region of the buffer the position falls in: the
    /// leading pad, the trailing pad, or the interior. These expressions compensate for
    /// the buffer geometry and must stay consistent with the tri-gram indexer.
    pub fn add_trigram(&mut self, pos: i32, field: usize) {
        let area = if pos < self.space_size {
            Area::new(0, pos + self.buffer_size - 1 - self.space_size)
        } else if pos > self.total_size - self.space_size {
            Area::new(
                pos - self.space_size,
                self.buffer_size - 1 + self.total_size - 2 * self.space_size,
            )
        } else {
            Area::new(
                pos - self.space_size,
                pos - self.space_size + self.buffer_size - 1,
            )
        };
        self.insert_area(area, field);
    }

    fn insert_area(&mut self, area: Area, field: usize) -> bool {
        self.committed = false;
        if self.areas.len() <= field {
            self.areas.resize(field + 1, Vec::new());
        }
        let list = &mut self.areas[field];
        if let Some(last) = list.last_mut() {
            if last.concat(area) {
                return true;
            }
        }
        if list.len() >= MAX_AREAS_IN_RESULT {
            return false;
        }
        list.push(area);
        true
    }

    /// Sorts each field's spans and merges every overlapping or touching pair.
    pub fn commit(&mut self) {
        self.committed = true;
        for list in &mut self.areas {
            list.sort_by_key(|area| area.start);
            coalesce(list);
        }
    }

    /// Returns the field's normalized spans, committing first if needed.
    /// `None` if the field index was never touched.
    pub fn get_areas(&mut self, field: usize) -> Option<&[Area]> {
        if !self.committed {
            self.commit();
        }
        self.areas.get(field).map(Vec::as_slice)
    }

    /// Returns a fresh span list for the field, each span padded by `front`/`back`,
    /// clamped to `[0, total_size]` and re-coalesced. The stored spans are not modified.
    pub fn get_snippet(&mut self, field: usize, front: i32, back: i32, total_size: i32) -> Vec<Area> {
        if !self.committed {
            self.commit();
        }
        let Some(list) = self.areas.get(field) else {
            return Vec::new();
        };
        let mut snippet = list.clone();
        for area in &mut snippet {
            area.start -= front;
            if area.start < 0 || front < 0 {
                area.start = 0;
            }
            area.end += back;
            if area.end > total_size || back < 0 {
                area.end = total_size;
            }
        }
        coalesce(&mut snippet);
        snippet
    }
}

/// Single left-to-right sweep over a sorted list, merging into a fresh container so no
/// element is ever removed out from under the iteration.
fn coalesce(list: &mut Vec<Area>) {
    let mut merged: Vec<Area> = Vec::with_capacity(list.len());
    for area in list.drain(..) {
        let merged_into_last = match merged.last_mut() {
            Some(last) => last.concat(area),
            None => false,
        };
        if !merged_into_last {
            merged.push(area);
        }
    }
    *list = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_words_merge_on_insert() {
        let mut holder = AreaHolder::new();
        assert!(holder.add_word(0, 3, 0));
        assert!(holder.add_word(2, 4, 0));
        assert!(holder.add_word(10, 2, 0));
        holder.commit();
        assert_eq!(
            holder.get_areas(0),
            Some(&[Area::new(0, 6), Area::new(10, 12)][..])
        );
    }

    #[test]
    fn touching_spans_merge_too() {
        let mut holder = AreaHolder::new();
        holder.add_word(0, 3, 0);
        holder.add_word(3, 3, 0);
        assert_eq!(holder.get_areas(0), Some(&[Area::new(0, 6)][..]));
    }

    #[test]
    fn out_of_order_inserts_coalesce_on_commit() {
        let mut holder = AreaHolder::new();
        holder.add_word(10, 2, 0);
        holder.add_word(0, 3, 0);
        holder.add_word(11, 3, 0);
        holder.add_word(2, 4, 0);
        assert_eq!(
            holder.get_areas(0),
            Some(&[Area::new(0, 6), Area::new(10, 14)][..])
        );
    }

    #[test]
    fn cap_rejects_the_sixth_disjoint_span() {
        let mut holder = AreaHolder::new();
        for i in 0..10 {
            let accepted = holder.add_word(i * 10, 2, 0);
            assert_eq!(accepted, i < 5, "call {i}");
        }
        assert_eq!(holder.get_areas(0).map(<[Area]>::len), Some(5));
    }

    #[test]
    fn mergeable_bursts_never_hit_the_cap() {
        let mut holder = AreaHolder::new();
        for i in 0..100 {
            assert!(holder.add_word(i, 2, 0));
        }
        assert_eq!(holder.get_areas(0), Some(&[Area::new(0, 101)][..]));
    }

    #[test]
    fn commit_is_idempotent() {
        let mut holder = AreaHolder::new();
        holder.add_word(7, 2, 1);
        holder.add_word(0, 3, 1);
        holder.commit();
        let snapshot = holder.clone();
        holder.commit();
        assert_eq!(holder.areas, snapshot.areas);
        assert_eq!(holder.committed, snapshot.committed);
    }

    #[test]
    fn fields_are_independent() {
        let mut holder = AreaHolder::new();
        holder.add_word(0, 3, 0);
        holder.add_word(1, 3, 2);
        assert_eq!(holder.get_areas(0), Some(&[Area::new(0, 3)][..]));
        assert_eq!(holder.get_areas(1), Some(&[][..]));
        assert_eq!(holder.get_areas(2), Some(&[Area::new(1, 4)][..]));
        assert_eq!(holder.get_areas(3), None);
    }

    #[test]
    fn reserve_fields_sizes_the_field_list() {
        let mut holder = AreaHolder::new();
        holder.reserve(8);
        holder.reserve_fields(3);
        assert_eq!(holder.get_areas(2), Some(&[][..]));
        assert_eq!(holder.get_areas(3), None);
    }

    #[test]
    fn snippet_expands_and_clamps() {
        let mut holder = AreaHolder::new();
        holder.add_word(0, 3, 0);
        assert_eq!(holder.get_snippet(0, 2, 4, 100), vec![Area::new(0, 7)]);
    }

    #[test]
    fn snippet_merges_windows_that_grow_into_each_other() {
        let mut holder = AreaHolder::new();
        holder.add_word(0, 3, 0);
        holder.add_word(10, 3, 0);
        assert_eq!(holder.get_snippet(0, 0, 7, 100), vec![Area::new(0, 20)]);
    }

    #[test]
    fn negative_padding_clamps_aggressively() {
        let mut holder = AreaHolder::new();
        holder.add_word(10, 5, 0);
        assert_eq!(holder.get_snippet(0, -1, -1, 100), vec![Area::new(0, 100)]);
    }

    #[test]
    fn snippet_does_not_mutate_stored_areas() {
        let mut holder = AreaHolder::new();
        holder.add_word(5, 3, 0);
        holder.get_snippet(0, 2, 2, 50);
        assert_eq!(holder.get_areas(0), Some(&[Area::new(5, 8)][..]));
    }

    #[test]
    fn snippet_of_untouched_field_is_empty() {
        let mut holder = AreaHolder::new();
        assert!(holder.get_snippet(4, 1, 1, 10).is_empty());
    }

    #[test]
    fn snippets_stay_inside_the_document() {
        // Deterministic pseudo-random insertions; every returned span must satisfy
        // 0 <= start <= end <= total for any total >= 0.
        let mut seed = 0x2545_f491u32;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        for total in [50i32, 300, 1000] {
            let mut holder = AreaHolder::new();
            for _ in 0..200 {
                let len = 1 + (next() % 20) as i32;
                let start = (next() % (total - len) as u32) as i32;
                let field = (next() % 3) as usize;
                holder.add_word(start, len, field);
            }
            for field in 0..3 {
                for area in holder.get_snippet(field, 7, 13, total) {
                    assert!(0 <= area.start, "{area:?}");
                    assert!(area.start <= area.end, "{area:?} total {total}");
                    assert!(area.end <= total, "{area:?} total {total}");
                }
            }
        }
    }

    #[test]
    fn committed_fields_are_sorted_and_disjoint() {
        let mut seed = 0x9e37_79b9u32;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        let mut holder = AreaHolder::new();
        for _ in 0..500 {
            let start = (next() % 300) as i32;
            let len = 1 + (next() % 20) as i32;
            let field = (next() % 4) as usize;
            holder.add_word(start, len, field);
        }
        holder.commit();
        for field in 0..4 {
            let areas = holder.get_areas(field).unwrap();
            assert!(areas.len() <= MAX_AREAS_IN_RESULT);
            for pair in areas.windows(2) {
                assert!(pair[0].end < pair[1].start, "{pair:?} in field {field}");
            }
        }
    }

    #[test]
    fn trigram_positions_map_through_the_buffer_geometry() {
        let mut holder = AreaHolder::with_trigram_geometry(6, 2, 20);
        // Head region: pos < space.
        holder.add_trigram(1, 0);
        // Interior.
        holder.add_trigram(10, 1);
        // Tail region: pos > total - space.
        holder.add_trigram(19, 2);
        assert_eq!(holder.get_areas(0), Some(&[Area::new(0, 4)][..]));
        assert_eq!(holder.get_areas(1), Some(&[Area::new(8, 13)][..]));
        assert_eq!(holder.get_areas(2), Some(&[Area::new(17, 21)][..]));
    }
}
