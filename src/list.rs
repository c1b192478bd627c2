// Index-linked list engine
//
// Every queue in the scheduler is one of these: records live in a
// fixed arena, a list names them by id, and the arena resolves each
// record's embedded link through the Links trait. No allocation, no
// pointer chasing, and a record can sit on at most one list at a time
// because it carries a single link.

/// Arena capability: read and rewrite the link field embedded in the
/// record named by `Id`.
pub trait Links {
    type Id: Copy + PartialEq;

    fn next(&self, id: Self::Id) -> Option<Self::Id>;
    fn set_next(&mut self, id: Self::Id, next: Option<Self::Id>);
}

/// Singly linked list of arena records with head and tail handles.
///
/// `first` and `last` are `None` together exactly when the list is
/// empty, and the last record's embedded link is always `None`.
#[derive(Clone, Copy, Debug)]
pub struct List<I> {
    first: Option<I>,
    last: Option<I>,
}

impl<I: Copy + PartialEq> List<I> {
    pub const fn new() -> Self {
        Self { first: None, last: None }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Head of the list without unlinking it.
    pub fn first(&self) -> Option<I> {
        self.first
    }

    /// Link `id` in at the head.
    pub fn push<L: Links<Id = I>>(&mut self, links: &mut L, id: I) {
        links.set_next(id, self.first);
        self.first = Some(id);
        if self.last.is_none() {
            self.last = Some(id);
        }
    }

    /// Unlink and return the head. The popped record's link is cleared.
    pub fn pop<L: Links<Id = I>>(&mut self, links: &mut L) -> Option<I> {
        let head = self.first?;
        self.first = links.next(head);
        if self.first.is_none() {
            self.last = None;
        }
        links.set_next(head, None);
        Some(head)
    }

    /// Link `id` in at the tail.
    pub fn append<L: Links<Id = I>>(&mut self, links: &mut L, id: I) {
        links.set_next(id, None);
        match self.last {
            Some(last) => {
                links.set_next(last, Some(id));
                self.last = Some(id);
            }
            None => {
                self.first = Some(id);
                self.last = Some(id);
            }
        }
    }

    /// Ordered insert. `before(arena, at, new)` answers whether `new`
    /// belongs in front of the existing record `at`; answering false on
    /// equal ranks keeps arrival order among equals, which is what every
    /// caller in the scheduler wants.
    pub fn insert<L, F>(&mut self, links: &mut L, id: I, before: F)
    where
        L: Links<Id = I>,
        F: Fn(&L, I, I) -> bool,
    {
        let Some(head) = self.first else {
            self.push(links, id);
            return;
        };
        if before(links, head, id) {
            self.push(links, id);
            return;
        }
        // walk to the record the new one goes after
        let mut at = head;
        while let Some(next) = links.next(at) {
            if before(links, next, id) {
                break;
            }
            at = next;
        }
        links.set_next(id, links.next(at));
        if links.next(at).is_none() {
            self.last = Some(id);
        }
        links.set_next(at, Some(id));
    }

    /// Scan for `id` and unlink it. Returns false when `id` is not a
    /// member; callers assert at sites where absence would mean the
    /// scheduler's own state went inconsistent.
    pub fn remove<L: Links<Id = I>>(&mut self, links: &mut L, id: I) -> bool {
        let Some(head) = self.first else {
            return false;
        };
        if head == id {
            self.first = links.next(id);
            if self.first.is_none() {
                self.last = None;
            }
            links.set_next(id, None);
            return true;
        }
        let mut at = head;
        loop {
            match links.next(at) {
                Some(next) if next == id => break,
                Some(next) => at = next,
                None => return false,
            }
        }
        links.set_next(at, links.next(id));
        if links.next(at).is_none() {
            self.last = Some(at);
        }
        links.set_next(id, None);
        true
    }

    pub fn contains<L: Links<Id = I>>(&self, links: &L, id: I) -> bool {
        self.iter(links).any(|at| at == id)
    }

    pub fn len<L: Links<Id = I>>(&self, links: &L) -> usize {
        self.iter(links).count()
    }

    /// Ids from head to tail.
    pub fn iter<'a, L: Links<Id = I>>(&self, links: &'a L) -> Iter<'a, L> {
        Iter { links, at: self.first }
    }
}

impl<I: Copy + PartialEq> Default for List<I> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, L: Links> {
    links: &'a L,
    at: Option<L::Id>,
}

impl<L: Links> Iterator for Iter<'_, L> {
    type Item = L::Id;

    fn next(&mut self) -> Option<L::Id> {
        let at = self.at?;
        self.at = self.links.next(at);
        Some(at)
    }
}
