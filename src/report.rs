use std::fmt;

use itertools::Itertools;

use crate::graph::NodeId;

/// Text rendering of a partition.
///
/// Both views list communities by descending size, keeping slot order among
/// equal sizes. Member lists print as `communities {[3, 2], [0]}`. The size
/// view run-length encodes the sizes, as in
/// `communities {s3x2, s1} [3]`, where the trailing number counts the
/// non-empty communities.
pub struct CommunityReport<'a> {
    communities: &'a [Vec<NodeId>],
    show_size: bool,
}

impl<'a> CommunityReport<'a> {
    pub fn new(communities: &'a [Vec<NodeId>], show_size: bool) -> Self {
        CommunityReport { communities, show_size }
    }

    /// Communities by descending size, stable among equal sizes.
    pub fn sorted(&self) -> Vec<&'a Vec<NodeId>> {
        self.communities
            .iter()
            .sorted_by(|a, b| b.len().cmp(&a.len()))
            .collect()
    }

    /// `(size, count)` pairs in descending size order.
    pub fn size_histogram(&self) -> Vec<(usize, usize)> {
        self.sorted()
            .into_iter()
            .map(|community| community.len())
            .dedup_with_count()
            .map(|(count, size)| (size, count))
            .collect()
    }

    pub fn non_empty(&self) -> usize {
        self.communities.iter().filter(|community| !community.is_empty()).count()
    }
}

impl fmt::Display for CommunityReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.show_size {
            let sizes = self
                .size_histogram()
                .into_iter()
                .map(|(size, count)| {
                    if count > 1 {
                        format!("s{}x{}", size, count)
                    } else {
                        format!("s{}", size)
                    }
                })
                .join(", ");
            write!(f, "communities {{{}}} [{}]", sizes, self.non_empty())
        } else {
            let members = self
                .sorted()
                .into_iter()
                .map(|community| format!("[{}]", community.iter().join(", ")))
                .join(", ");
            write!(f, "communities {{{}}}", members)
        }
    }
}

pub fn display_communities(communities: &[Vec<NodeId>], show_size: bool) -> String {
    CommunityReport::new(communities, show_size).to_string()
}
