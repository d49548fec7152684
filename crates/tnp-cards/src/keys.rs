//! Composite keys and the histogram names derived from them.
//!
//! Every histogram in a build is identified by an explicit key rather than
//! by a registry name; names are rendered from keys only when a histogram
//! is written out.

use std::fmt;

/// Pass/fail split of the tagger discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    /// `tagger >= cut`
    Pass,
    /// `tagger < cut`
    Fail,
}

impl Tag {
    /// Both tags, pass first.
    pub const ALL: [Tag; 2] = [Tag::Pass, Tag::Fail];

    /// Channel label (`pass` / `fail`).
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Pass => "pass",
            Tag::Fail => "fail",
        }
    }

    /// `true` for [`Tag::Pass`].
    pub fn is_pass(self) -> bool {
        self == Tag::Pass
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a one-sigma systematic shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// +1 sigma.
    Up,
    /// -1 sigma.
    Down,
}

impl Direction {
    /// Both directions, up first.
    pub const ALL: [Direction; 2] = [Direction::Up, Direction::Down];

    /// Lower-case label used in leaf names (`up` / `down`).
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Capitalised suffix expected by the datacard `$SYSTEMATIC` template.
    pub fn systematic_suffix(self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
        }
    }
}

/// Nominal or shifted weight/input variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    /// Central value.
    Nominal,
    /// One direction of a shape uncertainty.
    Shifted {
        /// Uncertainty name.
        uncertainty: String,
        /// Shift direction.
        direction: Direction,
    },
}

impl Variant {
    /// Shifted variant of `uncertainty`.
    pub fn shifted(uncertainty: impl Into<String>, direction: Direction) -> Self {
        Variant::Shifted { uncertainty: uncertainty.into(), direction }
    }

    /// Suffix of category histogram names: `nominal`, `<unc>Up`, `<unc>Down`.
    pub fn systematic_name(&self) -> String {
        match self {
            Variant::Nominal => "nominal".to_string(),
            Variant::Shifted { uncertainty, direction } => {
                format!("{uncertainty}{}", direction.systematic_suffix())
            }
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nominal => f.write_str("nominal"),
            Variant::Shifted { uncertainty, direction } => {
                write!(f, "{uncertainty}_{}", direction.as_str())
            }
        }
    }
}

/// Identity of one extracted histogram.
///
/// `category` is `None` for observed data, which is not split by category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafKey {
    /// Process name.
    pub process: String,
    /// Weight/input variant.
    pub variant: Variant,
    /// Position of the source file in the variant's file list.
    pub file_index: usize,
    /// Kinematic bin name.
    pub bin: String,
    /// Category, absent for data.
    pub category: Option<String>,
    /// Pass/fail channel.
    pub tag: Tag,
}

impl LeafKey {
    /// Key of a simulated leaf.
    pub fn simulated(
        process: &str,
        variant: &Variant,
        file_index: usize,
        bin: &str,
        category: &str,
        tag: Tag,
    ) -> Self {
        Self {
            process: process.to_string(),
            variant: variant.clone(),
            file_index,
            bin: bin.to_string(),
            category: Some(category.to_string()),
            tag,
        }
    }

    /// Key of a per-file data leaf.
    pub fn data(process: &str, file_index: usize, bin: &str, tag: Tag) -> Self {
        Self {
            process: process.to_string(),
            variant: Variant::Nominal,
            file_index,
            bin: bin.to_string(),
            category: None,
            tag,
        }
    }

    /// Unique histogram name.
    ///
    /// Simulated leaves render as `<process>_<variant>_<file>_<bin>_<category>_<tag>`,
    /// data leaves as `<process>_<file>_<bin>_<tag>`.
    pub fn name(&self) -> String {
        match &self.category {
            Some(cat) => format!(
                "{}_{}_{}_{}_{}_{}",
                self.process, self.variant, self.file_index, self.bin, cat, self.tag
            ),
            None => format!("{}_{}_{}_{}", self.process, self.file_index, self.bin, self.tag),
        }
    }
}

/// Name of a category total: `<category>_<bin>_<tag>_<nominal|unc{Up,Down}>`.
pub fn category_histogram_name(category: &str, bin: &str, tag: Tag, variant: &Variant) -> String {
    format!("{category}_{bin}_{tag}_{}", variant.systematic_name())
}

/// Name of an observed-data total: `data_<bin>_<tag>`.
pub fn data_histogram_name(bin: &str, tag: Tag) -> String {
    format!("data_{bin}_{tag}")
}
