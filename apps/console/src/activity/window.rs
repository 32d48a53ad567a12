//! 虚拟列表的纯数据部分：展开状态表、行高估算与测量缓存、可视窗口计算。
//!
//! 渲染层只负责把 [`VirtualWindow`] 中的行放到对应的偏移位置，并通过
//! [`Measurer`] 把真实高度回填到 [`RowHeights`]。

use std::collections::HashMap;
use std::ops::Range;

use crate::activity::row_key::RowKey;

pub const COLLAPSED_ROW_ESTIMATE: f64 = 120.0;
pub const EXPANDED_ROW_ESTIMATE: f64 = 217.0;
/// 测量值与缓存值相差小于该值时视为未变化，避免测量回填引起的反复重绘。
const MEASURE_EPSILON: f64 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowState {
    #[default]
    Collapsed,
    Expanded,
}

impl RowState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Collapsed => Self::Expanded,
            Self::Expanded => Self::Collapsed,
        }
    }

    pub fn is_expanded(self) -> bool {
        matches!(self, Self::Expanded)
    }
}

/// 每行一个两态状态机，存放在按下标寻址的表里；未登记的行视为 `Collapsed`。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpansionTable {
    slots: Vec<(RowKey, RowState)>,
    index: HashMap<RowKey, usize>,
}

impl ExpansionTable {
    pub fn state(&self, key: &RowKey) -> RowState {
        self.index
            .get(key)
            .map(|&slot| self.slots[slot].1)
            .unwrap_or_default()
    }

    pub fn toggle(&mut self, key: &RowKey) -> RowState {
        match self.index.get(key) {
            Some(&slot) => {
                let next = self.slots[slot].1.toggled();
                self.slots[slot].1 = next;
                next
            }
            None => {
                let next = RowState::default().toggled();
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push((key.clone(), next));
                next
            }
        }
    }

    pub fn expanded_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|(_, state)| state.is_expanded())
            .count()
    }

    pub fn remove(&mut self, key: &RowKey) {
        if let Some(slot) = self.index.remove(key) {
            self.slots.swap_remove(slot);
            if let Some((moved, _)) = self.slots.get(slot) {
                self.index.insert(moved.clone(), slot);
            }
        }
    }

    /// 删除不再存在于历史中的行，并重建下标。
    pub fn retain<'a>(&mut self, live: impl IntoIterator<Item = &'a RowKey>) {
        let live: std::collections::HashSet<&RowKey> = live.into_iter().collect();
        self.slots.retain(|(key, _)| live.contains(key));
        self.reindex();
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    fn reindex(&mut self) {
        self.index = self
            .slots
            .iter()
            .enumerate()
            .map(|(slot, (key, _))| (key.clone(), slot))
            .collect();
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightEstimate {
    pub collapsed: f64,
    pub expanded: f64,
}

impl Default for HeightEstimate {
    fn default() -> Self {
        Self {
            collapsed: COLLAPSED_ROW_ESTIMATE,
            expanded: EXPANDED_ROW_ESTIMATE,
        }
    }
}

impl HeightEstimate {
    pub fn for_state(&self, state: RowState) -> f64 {
        match state {
            RowState::Collapsed => self.collapsed,
            RowState::Expanded => self.expanded,
        }
    }
}

/// 测量能力，由渲染层实现。
pub trait Measurer {
    fn measure(&self, key: &RowKey) -> Option<f64>;
}

/// 行高：已测量的用测量值，否则按展开状态估算。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowHeights {
    estimate: HeightEstimate,
    measured: HashMap<RowKey, f64>,
}

impl RowHeights {
    pub fn new(estimate: HeightEstimate) -> Self {
        Self {
            estimate,
            measured: HashMap::new(),
        }
    }

    pub fn size_of(&self, key: &RowKey, state: RowState) -> f64 {
        self.measured
            .get(key)
            .copied()
            .unwrap_or_else(|| self.estimate.for_state(state))
    }

    pub fn measured(&self, key: &RowKey) -> Option<f64> {
        self.measured.get(key).copied()
    }

    /// 展开状态变化后只作废该行的测量值，其它行保持不变。
    pub fn invalidate(&mut self, key: &RowKey) {
        self.measured.remove(key);
    }

    /// 新的测量值是否会改变缓存。
    pub fn would_change(&self, key: &RowKey, height: f64) -> bool {
        if !height.is_finite() || height <= 0.0 {
            return false;
        }
        !matches!(
            self.measured.get(key),
            Some(previous) if (previous - height).abs() < MEASURE_EPSILON
        )
    }

    /// 记录测量值，返回是否有实际变化。
    pub fn record(&mut self, key: &RowKey, height: f64) -> bool {
        if !self.would_change(key, height) {
            return false;
        }
        self.measured.insert(key.clone(), height);
        true
    }

    /// 让 `measurer` 测量给定行，只返回会改变缓存的结果，不修改自身。
    pub fn collect_measurements<'a>(
        &self,
        measurer: &dyn Measurer,
        keys: impl IntoIterator<Item = &'a RowKey>,
    ) -> Vec<(RowKey, f64)> {
        keys.into_iter()
            .filter_map(|key| measurer.measure(key).map(|height| (key, height)))
            .filter(|(key, height)| self.would_change(key, *height))
            .map(|(key, height)| (key.clone(), height))
            .collect()
    }

    pub fn retain<'a>(&mut self, live: impl IntoIterator<Item = &'a RowKey>) {
        let live: std::collections::HashSet<&RowKey> = live.into_iter().collect();
        self.measured.retain(|key, _| live.contains(key));
    }

    pub fn clear(&mut self) {
        self.measured.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_top: 0.0,
            height: 600.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VirtualRow {
    pub index: usize,
    pub key: RowKey,
    pub start: f64,
    pub size: f64,
    pub state: RowState,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VirtualWindow {
    pub rows: Vec<VirtualRow>,
    pub total_height: f64,
}

impl VirtualWindow {
    pub fn range(&self) -> Range<usize> {
        match (self.rows.first(), self.rows.last()) {
            (Some(first), Some(last)) => first.index..last.index + 1,
            _ => 0..0,
        }
    }
}

/// 计算可视窗口：前缀和求偏移，二分查找首个可见行，再向两侧扩展 `overscan` 行。
pub fn compute_window(
    keys: &[RowKey],
    expansion: &ExpansionTable,
    heights: &RowHeights,
    viewport: Viewport,
    overscan: usize,
) -> VirtualWindow {
    if keys.is_empty() {
        return VirtualWindow::default();
    }

    let mut offsets = Vec::with_capacity(keys.len() + 1);
    let mut sizes = Vec::with_capacity(keys.len());
    offsets.push(0.0);
    for key in keys {
        let size = heights.size_of(key, expansion.state(key));
        let end = offsets.last().copied().unwrap_or(0.0) + size;
        sizes.push(size);
        offsets.push(end);
    }
    let total_height = offsets[keys.len()];

    let scroll_top = viewport.scroll_top.clamp(0.0, total_height.max(0.0));
    let bottom = scroll_top + viewport.height.max(0.0);

    // 第一个底边超过 scroll_top 的行
    let first_visible = offsets[1..]
        .partition_point(|end| *end <= scroll_top)
        .min(keys.len() - 1);
    // 第一个顶边不小于视口底部的行
    let last_exclusive = offsets[..keys.len()]
        .partition_point(|start| *start < bottom)
        .max(first_visible + 1);

    let start = first_visible.saturating_sub(overscan);
    let end = (last_exclusive + overscan).min(keys.len());

    let rows = (start..end)
        .map(|index| VirtualRow {
            index,
            key: keys[index].clone(),
            start: offsets[index],
            size: sizes[index],
            state: expansion.state(&keys[index]),
        })
        .collect();

    VirtualWindow { rows, total_height }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn keys(n: usize) -> Vec<RowKey> {
        (0..n).map(|i| RowKey::from(format!("k{i}"))).collect()
    }

    struct FixedMeasurer(HashMap<String, f64>, RefCell<Vec<String>>);

    impl Measurer for FixedMeasurer {
        fn measure(&self, key: &RowKey) -> Option<f64> {
            self.1.borrow_mut().push(key.to_string());
            self.0.get(key.as_str()).copied()
        }
    }

    #[test]
    fn rows_start_collapsed_and_toggle_between_two_states() {
        let mut table = ExpansionTable::default();
        let key = RowKey::from("k1");
        assert_eq!(table.state(&key), RowState::Collapsed);
        assert_eq!(table.toggle(&key), RowState::Expanded);
        assert_eq!(table.state(&key), RowState::Expanded);
        assert_eq!(table.toggle(&key), RowState::Collapsed);
        assert_eq!(table.expanded_count(), 0);
    }

    #[test]
    fn retain_prunes_rows_and_keeps_index_consistent() {
        let mut table = ExpansionTable::default();
        let all = keys(3);
        for key in &all {
            table.toggle(key);
        }
        table.retain([&all[2]]);
        assert_eq!(table.state(&all[0]), RowState::Collapsed);
        assert_eq!(table.state(&all[2]), RowState::Expanded);
        assert_eq!(table.toggle(&all[2]), RowState::Collapsed);
    }

    #[test]
    fn remove_moves_last_slot_into_the_gap() {
        let mut table = ExpansionTable::default();
        let all = keys(3);
        for key in &all {
            table.toggle(key);
        }
        table.remove(&all[0]);
        table.remove(&RowKey::from("missing"));

        assert_eq!(table.state(&all[0]), RowState::Collapsed);
        assert_eq!(table.expanded_count(), 2);
        assert_eq!(table.toggle(&all[2]), RowState::Collapsed);
        assert_eq!(table.state(&all[1]), RowState::Expanded);
    }

    #[test]
    fn toggling_one_row_only_changes_that_row() {
        let all = keys(3);
        let mut table = ExpansionTable::default();
        let mut heights = RowHeights::default();
        heights.record(&all[0], 140.0);
        heights.record(&all[2], 90.0);
        heights.record(&all[1], 130.0);

        table.toggle(&all[1]);
        heights.invalidate(&all[1]);

        assert_eq!(heights.measured(&all[0]), Some(140.0));
        assert_eq!(heights.measured(&all[2]), Some(90.0));
        assert_eq!(heights.size_of(&all[1], table.state(&all[1])), EXPANDED_ROW_ESTIMATE);
        assert_eq!(heights.size_of(&all[0], table.state(&all[0])), 140.0);
    }

    #[test]
    fn record_ignores_jitter_and_invalid_values() {
        let key = RowKey::from("k");
        let mut heights = RowHeights::default();
        assert!(heights.record(&key, 100.0));
        assert!(!heights.record(&key, 100.2));
        assert!(!heights.record(&key, f64::NAN));
        assert!(!heights.record(&key, 0.0));
        assert!(heights.record(&key, 180.0));
    }

    #[test]
    fn only_changed_measurements_are_collected() {
        let all = keys(2);
        let measurer = FixedMeasurer(
            [("k0".to_string(), 150.0)].into_iter().collect(),
            RefCell::new(Vec::new()),
        );
        let mut heights = RowHeights::default();

        let first = heights.collect_measurements(&measurer, all.iter());
        assert_eq!(first, vec![(all[0].clone(), 150.0)]);
        for (key, height) in &first {
            assert!(heights.record(key, *height));
        }

        assert!(heights.collect_measurements(&measurer, all.iter()).is_empty());
        assert_eq!(heights.measured(&all[0]), Some(150.0));
        assert_eq!(heights.measured(&all[1]), None);
        assert_eq!(measurer.1.borrow().len(), 4);
    }

    #[test]
    fn window_materializes_viewport_plus_overscan() {
        let all = keys(100);
        let window = compute_window(
            &all,
            &ExpansionTable::default(),
            &RowHeights::new(HeightEstimate {
                collapsed: 100.0,
                expanded: 200.0,
            }),
            Viewport {
                scroll_top: 1_000.0,
                height: 300.0,
            },
            2,
        );

        assert_eq!(window.total_height, 10_000.0);
        assert_eq!(window.range(), 8..15);
        assert_eq!(window.rows[0].start, 800.0);
    }

    #[test]
    fn window_uses_expanded_and_measured_sizes() {
        let all = keys(4);
        let mut table = ExpansionTable::default();
        table.toggle(&all[0]);
        let mut heights = RowHeights::new(HeightEstimate {
            collapsed: 100.0,
            expanded: 200.0,
        });
        heights.record(&all[1], 50.0);

        let window = compute_window(&all, &table, &heights, Viewport::default(), 0);
        let starts: Vec<f64> = window.rows.iter().map(|row| row.start).collect();
        assert_eq!(starts, vec![0.0, 200.0, 250.0, 350.0]);
        assert_eq!(window.total_height, 450.0);
        assert!(window.rows[0].state.is_expanded());
    }

    #[test]
    fn window_clamps_scroll_past_the_end() {
        let all = keys(5);
        let window = compute_window(
            &all,
            &ExpansionTable::default(),
            &RowHeights::default(),
            Viewport {
                scroll_top: 99_999.0,
                height: 100.0,
            },
            1,
        );
        assert_eq!(window.range(), 3..5);
    }

    #[test]
    fn empty_list_has_empty_window() {
        let window = compute_window(
            &[],
            &ExpansionTable::default(),
            &RowHeights::default(),
            Viewport::default(),
            5,
        );
        assert!(window.rows.is_empty());
        assert_eq!(window.total_height, 0.0);
        assert_eq!(window.range(), 0..0);
    }

    #[test]
    fn expansion_change_keeps_rows_above_in_place() {
        let all = keys(10);
        let mut table = ExpansionTable::default();
        let heights = RowHeights::new(HeightEstimate {
            collapsed: 100.0,
            expanded: 250.0,
        });
        let viewport = Viewport {
            scroll_top: 300.0,
            height: 200.0,
        };

        let before = compute_window(&all, &table, &heights, viewport, 0);
        table.toggle(&all[5]);
        let after = compute_window(&all, &table, &heights, viewport, 0);

        assert_eq!(before.rows[0].key, after.rows[0].key);
        assert_eq!(before.rows[0].start, after.rows[0].start);
        assert_eq!(after.total_height, before.total_height + 150.0);
    }
}
