//! Chapter sequencing and lock derivation
//!
//! Pure functions over a course's chapter list and a student's completed
//! chapter IDs. Order always comes from the `sequence` field; storage return
//! order is never trusted. Sequence values may have gaps, only relative order
//! matters.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::ChapterRow;
use crate::error::LmsError;

/// A chapter as shown to a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub completed: bool,
    pub locked: bool,
}

/// Where a chapter sits in its course
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPosition {
    pub index: usize,
    /// ID of the immediately preceding chapter, None for the first
    pub previous_id: Option<String>,
}

/// Sort chapters by ascending sequence
pub fn order_by_sequence(chapters: &mut [ChapterRow]) {
    chapters.sort_by_key(|c| c.sequence);
}

/// Derive completed/locked state for every chapter.
///
/// A chapter is locked iff it is not first and its predecessor is not
/// completed. The first chapter is never locked.
pub fn derive_chapter_views(
    mut chapters: Vec<ChapterRow>,
    completed: &HashSet<String>,
) -> Vec<ChapterView> {
    order_by_sequence(&mut chapters);

    let mut views = Vec::with_capacity(chapters.len());
    let mut previous_completed = true;

    for chapter in chapters {
        let is_completed = completed.contains(&chapter.id);
        views.push(ChapterView {
            completed: is_completed,
            locked: !previous_completed,
            id: chapter.id,
            title: chapter.title,
            description: chapter.description,
            image_url: chapter.image_url,
            video_url: chapter.video_url,
        });
        previous_completed = is_completed;
    }

    views
}

/// Find a chapter's index and predecessor within its course.
///
/// A chapter missing from its own course's list means the data is
/// inconsistent and is reported as `InvalidState`.
pub fn locate_chapter(
    mut chapters: Vec<ChapterRow>,
    chapter_id: &str,
) -> Result<ChapterPosition, LmsError> {
    order_by_sequence(&mut chapters);

    let index = chapters
        .iter()
        .position(|c| c.id == chapter_id)
        .ok_or_else(|| LmsError::InvalidState("Invalid chapter".into()))?;

    let previous_id = index
        .checked_sub(1)
        .map(|prev| chapters[prev].id.clone());

    Ok(ChapterPosition { index, previous_id })
}
