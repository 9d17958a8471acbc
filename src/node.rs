/// Key-value entry.
///
/// An entry is owned by exactly one bucket at a time. Growth moves the box from
/// one chain to another; the entry itself is never copied.
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Option<Box<Entry<K, V>>>,
}

/// The chain of entries colliding on one bucket.
///
/// New keys are linked at the head, so the chain is ordered most recently
/// inserted first.
pub(crate) struct Bucket<K, V> {
    head: Option<Box<Entry<K, V>>>,
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self { head: None }
    }
}

impl<K, V> Bucket<K, V> {
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Links `entry` in at the head of the chain.
    pub(crate) fn push(&mut self, mut entry: Box<Entry<K, V>>) {
        entry.next = self.head.take();
        self.head = Some(entry);
    }

    /// Unlinks the head of the chain.
    pub(crate) fn pop(&mut self) -> Option<Box<Entry<K, V>>> {
        let mut entry = self.head.take()?;
        self.head = entry.next.take();
        Some(entry)
    }

    pub(crate) fn iter(&self) -> Chain<'_, K, V> {
        Chain {
            next: self.head.as_deref(),
        }
    }
}

impl<K, V> Bucket<K, V>
where
    K: Eq,
{
    pub(crate) fn find(&self, key: &K) -> Option<&Entry<K, V>> {
        self.iter().find(|e| &e.key == key)
    }

    pub(crate) fn find_mut(&mut self, key: &K) -> Option<&mut Entry<K, V>> {
        let mut node = self.head.as_deref_mut();
        while let Some(n) = node {
            if &n.key == key {
                return Some(n);
            }
            node = n.next.as_deref_mut();
        }
        None
    }

    /// Unlinks the entry for `key`, if there is one, and hands it back.
    pub(crate) fn remove(&mut self, key: &K) -> Option<Box<Entry<K, V>>> {
        // walk the links rather than the nodes, so that unlinking the head and
        // unlinking a later node are the same operation
        let mut link = &mut self.head;
        while link.as_ref().is_some_and(|n| &n.key != key) {
            link = &mut link.as_mut()?.next;
        }
        let mut removed = link.take()?;
        *link = removed.next.take();
        Some(removed)
    }
}

impl<K, V> Drop for Bucket<K, V> {
    fn drop(&mut self) {
        // unlink one node at a time; the default recursive drop of a long chain
        // could run out of stack
        while self.pop().is_some() {}
    }
}

/// Iterator over the entries of one chain, head first.
pub(crate) struct Chain<'a, K, V> {
    next: Option<&'a Entry<K, V>>,
}

impl<'a, K, V> Iterator for Chain<'a, K, V> {
    type Item = &'a Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.next?;
        self.next = entry.next.as_deref();
        Some(entry)
    }
}

pub(crate) fn entry<K, V>(key: K, value: V) -> Box<Entry<K, V>> {
    Box::new(Entry {
        key,
        value,
        next: None,
    })
}
