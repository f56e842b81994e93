use std::fmt;

/// A group of weighted items that gets handed to one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin<T> {
    items: Vec<T>,
    weight: usize,
}

impl<T> Bin<T> {
    fn new() -> Self {
        Bin {
            items: Vec::new(),
            weight: 0,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// The sum of the weights of the items
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace every item, keeping the weight
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Bin<U> {
        Bin {
            items: self.items.into_iter().map(f).collect(),
            weight: self.weight,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Bin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weight {:>6}:", self.weight)?;
        for item in &self.items {
            write!(f, " {}", item)?;
        }
        Ok(())
    }
}

/// Partition weighted items into `bins` bins with the longest processing time
/// first heuristic: heaviest item first, each into the currently lightest bin,
/// ties going to the lowest bin index. Always returns `bins` bins (at least
/// one), some of which may be empty.
pub fn balance<T>(items: Vec<(T, usize)>, bins: usize) -> Vec<Bin<T>> {
    let mut result: Vec<Bin<T>> = (0..bins.max(1)).map(|_| Bin::new()).collect();
    let mut items = items;
    // stable, so equally heavy items keep their order
    items.sort_by(|a, b| b.1.cmp(&a.1));
    for (item, weight) in items {
        let lightest = result
            .iter_mut()
            .enumerate()
            .min_by_key(|(i, bin)| (bin.weight, *i))
            .map(|(_, bin)| bin);
        if let Some(bin) = lightest {
            bin.items.push(item);
            bin.weight += weight;
        }
    }
    result
}

/// Render a balance plan, one line per bin
pub fn report<T: fmt::Display>(bins: &[Bin<T>]) -> String {
    let total: usize = bins.iter().map(Bin::weight).sum();
    let mut out = String::new();
    for (i, bin) in bins.iter().enumerate() {
        out.push_str(&format!(
            "Batch {:>2} ({} items, {}): {}\n",
            i + 1,
            bin.len(),
            percentage(bin.weight, total),
            bin
        ));
    }
    out.push_str(&format!("Total weight: {}\n", total));
    out
}

fn percentage(part: usize, total: usize) -> String {
    if total == 0 {
        "0.0%".to_owned()
    } else {
        format!("{:.1}%", part as f64 * 100.0 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lpt() {
        let bins = balance(vec![("a", 5), ("b", 4), ("c", 3), ("d", 3), ("e", 1)], 2);
        assert_eq!(bins.len(), 2);
        // a -> 0, b -> 1, c -> 1 (4 < 5), d -> 0 (5 < 7), e -> 1 (7 < 8)
        assert_eq!(bins[0].items(), &["a", "d"]);
        assert_eq!(bins[1].items(), &["b", "c", "e"]);
        assert_eq!(bins[0].weight(), 8);
        assert_eq!(bins[1].weight(), 8);
    }

    #[test]
    fn test_ties_go_to_lowest_bin() {
        let bins = balance(vec![("a", 1), ("b", 1), ("c", 1)], 3);
        assert_eq!(bins[0].items(), &["a"]);
        assert_eq!(bins[1].items(), &["b"]);
        assert_eq!(bins[2].items(), &["c"]);
    }

    #[test]
    fn test_more_bins_than_items() {
        let bins = balance(vec![("a", 10)], 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().filter(|b| b.is_empty()).count(), 3);
        let zero = balance(vec![("a", 1), ("b", 2)], 0);
        assert_eq!(zero.len(), 1);
        assert_eq!(zero[0].items(), &["b", "a"]);
    }

    #[test]
    fn test_every_item_placed_once() {
        let items: Vec<_> = (0..66).map(|i| (i, (i * 37) % 11 + 1)).collect();
        let total: usize = items.iter().map(|(_, w)| w).sum();
        let bins = balance(items, 6);
        let mut placed: Vec<_> = bins.iter().flat_map(|b| b.items().iter().copied()).collect();
        placed.sort();
        assert_eq!(placed, (0..66).collect::<Vec<_>>());
        assert_eq!(bins.iter().map(Bin::weight).sum::<usize>(), total);
        let heaviest = bins.iter().map(Bin::weight).max().unwrap();
        let lightest = bins.iter().map(Bin::weight).min().unwrap();
        assert!(heaviest - lightest <= 11);
    }

    #[test]
    fn test_report() {
        let bins = balance(vec![("laws", 3), ("goods", 1)], 2);
        let report = report(&bins);
        assert!(report.contains("Batch  1 (1 items, 75.0%): weight      3: laws"));
        assert!(report.ends_with("Total weight: 4\n"));
    }
}
