use super::*;

impl Keyspace {
    /// Pushes values to the head of a list, creating it if absent.
    ///
    /// Arguments are prepended one at a time, so the final argument
    /// ends up as the first element. Returns the new length.
    pub fn lpush(&mut self, key: &str, values: &[Bytes]) -> Result<usize, WrongType> {
        self.list_push(key, values, true)
    }

    /// Pushes values to the tail of a list in argument order, creating
    /// it if absent. Returns the new length.
    pub fn rpush(&mut self, key: &str, values: &[Bytes]) -> Result<usize, WrongType> {
        self.list_push(key, values, false)
    }

    /// Pops from the head of a list. See [`Keyspace::list_pop`].
    pub fn lpop(&mut self, key: &str, count: Option<i64>) -> Result<Option<Popped>, PopError> {
        self.list_pop(key, count, true)
    }

    /// Pops from the tail of a list. See [`Keyspace::list_pop`].
    pub fn rpop(&mut self, key: &str, count: Option<i64>) -> Result<Option<Popped>, PopError> {
        self.list_pop(key, count, false)
    }

    /// Returns the elements between `start` and `stop` (inclusive,
    /// negative indices count from the end). Missing keys yield an
    /// empty vec.
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>, WrongType> {
        let entry = match self.live_entry(key) {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };
        let items = entry.value.as_list()?;
        let (s, e) = normalize_range(start, stop, items.len() as i64);
        if s > e {
            return Ok(Vec::new());
        }
        Ok(items
            .iter()
            .skip(s as usize)
            .take((e - s + 1) as usize)
            .cloned()
            .collect())
    }

    /// Trims the list to the elements between `start` and `stop`
    /// (inclusive). A range that selects nothing deletes the key.
    pub fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> Result<(), WrongType> {
        if self.purge_expired(key) {
            return Ok(());
        }
        let entry = match self.entries.get_mut(key) {
            Some(entry) => entry,
            None => return Ok(()),
        };
        let Value::List(ref mut items) = entry.value else {
            return Err(WrongType);
        };

        let len = items.len() as i64;
        let (s, e) = normalize_range(start, stop, len);
        if s > e || s >= len {
            self.entries.remove(key);
            return Ok(());
        }

        items.truncate((e + 1) as usize);
        items.drain(..s as usize);
        Ok(())
    }

    /// Shared push implementation for lpush/rpush.
    fn list_push(&mut self, key: &str, values: &[Bytes], left: bool) -> Result<usize, WrongType> {
        self.purge_expired(key);

        let entry = self
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Entry::new(Value::List(VecDeque::new()), None));
        let Value::List(ref mut items) = entry.value else {
            return Err(WrongType);
        };

        for val in values {
            if left {
                items.push_front(val.clone());
            } else {
                items.push_back(val.clone());
            }
        }
        Ok(items.len())
    }

    /// Shared pop implementation for lpop/rpop.
    ///
    /// Without a count, pops a single element. With a count: negative
    /// is an error, zero yields an empty sequence, larger than the list
    /// caps at the length. Absent and expired keys yield `None` before
    /// the count is validated. A list emptied by a pop stays in place.
    fn list_pop(
        &mut self,
        key: &str,
        count: Option<i64>,
        left: bool,
    ) -> Result<Option<Popped>, PopError> {
        if self.purge_expired(key) {
            return Ok(None);
        }
        let entry = match self.entries.get_mut(key) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(n) = count {
            if n < 0 {
                return Err(PopError::OutOfRange);
            }
        }

        let Value::List(ref mut items) = entry.value else {
            return Err(PopError::WrongType);
        };
        if items.is_empty() {
            return Ok(None);
        }

        let take = count
            .map(|n| (n as usize).min(items.len()))
            .unwrap_or(1);

        let mut popped = Vec::with_capacity(take);
        for _ in 0..take {
            let elem = if left {
                items.pop_front()
            } else {
                items.pop_back()
            };
            match elem {
                Some(elem) => popped.push(elem),
                None => break,
            }
        }
        // RPOP with a count returns the tail slice in list order
        if !left {
            popped.reverse();
        }

        match count {
            None => Ok(popped.into_iter().next().map(Popped::One)),
            Some(_) => Ok(Some(Popped::Many(popped))),
        }
    }
}
