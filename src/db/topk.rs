use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// 保留距离最小的 k 个元素
///
/// 距离相同时，先加入的元素排在前面
pub struct TopK<T> {
    k: usize,
    seq: usize,
    heap: BinaryHeap<Candidate<T>>,
}

struct Candidate<T> {
    distance: f32,
    seq: usize,
    item: T,
}

impl<T> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Candidate<T> {}

impl<T> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then(self.seq.cmp(&other.seq))
    }
}

impl<T> TopK<T> {
    pub fn new(k: usize) -> Self {
        Self { k, seq: 0, heap: BinaryHeap::with_capacity(k + 1) }
    }

    pub fn push(&mut self, distance: f32, item: T) {
        if self.k == 0 {
            return;
        }
        let seq = self.seq;
        self.seq += 1;
        // 堆顶是当前最差的候选
        if self.heap.len() == self.k {
            if let Some(worst) = self.heap.peek() {
                if distance.total_cmp(&worst.distance) != Ordering::Less {
                    return;
                }
            }
        }
        self.heap.push(Candidate { distance, seq, item });
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    /// 按距离升序返回
    pub fn into_sorted_vec(self) -> Vec<(f32, T)> {
        self.heap.into_sorted_vec().into_iter().map(|c| (c.distance, c.item)).collect()
    }
}
