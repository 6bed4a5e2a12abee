/// Per-worker buffer grouping records into fixed-size batches.
///
/// [`add`](Self::add) hands back the full batch as soon as the threshold is
/// reached and starts a fresh one, so the caller submits it before adding
/// anything else. [`finish`](Self::finish) yields the final partial batch.
#[derive(Debug)]
pub struct BatchAccumulator<T> {
    items: Vec<T>,
    batch_size: usize,
}

impl<T> BatchAccumulator<T> {
    pub fn new(batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be at least 1");
        Self {
            items: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    #[must_use = "a full batch must be submitted"]
    pub fn add(&mut self, item: T) -> Option<Vec<T>> {
        self.items.push(item);
        if self.items.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut self.items,
                Vec::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    pub fn finish(self) -> Option<Vec<T>> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items)
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
