//! Year-in-review slide timeline.

use serde::Serialize;

use crate::db::{Entry, Tag};

/// Statistics for one calendar year of journaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearStats {
    pub year: i32,
    pub entry_count: usize,
    pub tag_count: usize,
    /// Title and content length of the longest entry.
    pub longest: Option<(String, usize)>,
    pub shortest: Option<(String, usize)>,
}

impl YearStats {
    /// `entries` and `tags` must already be restricted to `year`.
    pub fn collect(year: i32, entries: &[Entry], tags: &[Tag]) -> Self {
        let sized = |e: &Entry| (e.title.clone(), e.content.chars().count());

        // Ties go to the earliest entry in both directions.
        let longest = entries
            .iter()
            .rev()
            .max_by_key(|e| e.content.chars().count())
            .map(sized);
        let shortest = entries
            .iter()
            .min_by_key(|e| e.content.chars().count())
            .map(sized);

        Self {
            year,
            entry_count: entries.len(),
            tag_count: tags.len(),
            longest,
            shortest,
        }
    }

    /// Slide texts in display order.
    pub fn slide_texts(&self) -> Vec<String> {
        let mut texts = vec![
            format!("Your {} in review", self.year),
            plural(self.entry_count, "journal entry", "journal entries"),
            plural(self.tag_count, "new tag", "new tags"),
        ];
        if let Some((title, len)) = &self.longest {
            texts.push(format!("Longest entry: {} ({} characters)", title, len));
        }
        if let Some((title, len)) = &self.shortest {
            texts.push(format!("Shortest entry: {} ({} characters)", title, len));
        }
        texts.push("Thanks for journaling with EpicMe!".to_string());
        texts
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

/// One slide and its slot on the timeline, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slide {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl Slide {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Length of the fade in and of the fade out.
    pub fn fade(&self) -> f64 {
        self.duration / 3.0
    }

    /// Opacity in `[0, 1]` at absolute time `t`.
    ///
    /// Fades in over the first third of the slot, holds, then fades out
    /// over the last third. Zero outside the slot.
    pub fn opacity(&self, t: f64) -> f64 {
        let local = t - self.start;
        if self.duration <= 0.0 || local < 0.0 || local > self.duration {
            return 0.0;
        }
        let fade = self.fade();
        let alpha = if local < fade {
            local / fade
        } else if local > self.duration - fade {
            (self.duration - local) / fade
        } else {
            1.0
        };
        alpha.clamp(0.0, 1.0)
    }
}

/// Slides laid out in equal slots over a fixed total duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub year: i32,
    pub total_seconds: f64,
    pub slides: Vec<Slide>,
}

impl Timeline {
    pub fn new(year: i32, texts: Vec<String>, total_seconds: f64) -> Self {
        let slot = if texts.is_empty() {
            0.0
        } else {
            total_seconds / texts.len() as f64
        };
        let slides = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Slide {
                text,
                start: i as f64 * slot,
                duration: slot,
            })
            .collect();
        Self {
            year,
            total_seconds,
            slides,
        }
    }

    pub fn from_stats(stats: &YearStats, total_seconds: f64) -> Self {
        Self::new(stats.year, stats.slide_texts(), total_seconds)
    }
}
