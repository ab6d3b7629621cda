use super::*;

impl Keyspace {
    /// Retrieves the string value for `key`, or `None` if missing or
    /// expired. Returns `Err(WrongType)` for non-string values.
    pub fn get(&self, key: &str) -> Result<Option<Bytes>, WrongType> {
        match self.live_entry(key) {
            Some(entry) => entry.value.as_string().map(|b| Some(b.clone())),
            None => Ok(None),
        }
    }

    /// Returns the substring of the string value between `start` and
    /// `end` (inclusive, negative indices count from the end). Absent
    /// keys yield the empty string.
    pub fn getrange(&self, key: &str, start: i64, end: i64) -> Result<Bytes, WrongType> {
        let entry = match self.live_entry(key) {
            Some(entry) => entry,
            None => return Ok(Bytes::new()),
        };
        let data = entry.value.as_string()?;
        let (s, e) = normalize_range(start, end, data.len() as i64);
        if s > e {
            return Ok(Bytes::new());
        }
        Ok(data.slice(s as usize..(e + 1) as usize))
    }

    /// Returns the length of the string value, or 0 for an absent key.
    pub fn strlen(&self, key: &str) -> Result<usize, WrongType> {
        match self.live_entry(key) {
            Some(entry) => entry.value.as_string().map(Bytes::len),
            None => Ok(0),
        }
    }

    /// Returns the type name of the value at `key`, or "none" if the
    /// key is absent or expired.
    pub fn value_type(&self, key: &str) -> &'static str {
        match self.live_entry(key) {
            Some(entry) => value::type_name(&entry.value),
            None => "none",
        }
    }

    /// Stores a key-value pair with optional NX/XX conditions and TTL.
    ///
    /// - `nx`: only set if the key does NOT already exist
    /// - `xx`: only set if the key DOES already exist
    ///
    /// Overwriting clears any previous expiration unless a new `expire`
    /// is supplied.
    pub fn set(
        &mut self,
        key: &str,
        value: Bytes,
        expire: Option<Duration>,
        nx: bool,
        xx: bool,
    ) -> SetOutcome {
        self.purge_expired(key);

        let key_exists = self.entries.contains_key(key);
        if nx && key_exists {
            return SetOutcome::Blocked;
        }
        if xx && !key_exists {
            return SetOutcome::Blocked;
        }

        self.entries
            .insert(Box::from(key), Entry::new(Value::String(value), expire));
        SetOutcome::Applied
    }

    /// Adds `delta` to the integer value of the key, creating it as "0"
    /// if absent. The result is re-encoded as decimal ASCII; any
    /// existing TTL is preserved.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64, IncrError> {
        self.purge_expired(key);

        let (current, expires_at_ms) = match self.entries.get(key) {
            Some(entry) => {
                let data = entry.value.as_string().map_err(|_| IncrError::WrongType)?;
                let text = std::str::from_utf8(data).map_err(|_| IncrError::NotAnInteger)?;
                let parsed = text.parse::<i64>().map_err(|_| IncrError::NotAnInteger)?;
                (parsed, entry.expires_at_ms)
            }
            None => (0, time::NO_EXPIRY),
        };

        let new_val = current.checked_add(delta).ok_or(IncrError::NotAnInteger)?;
        self.entries.insert(
            Box::from(key),
            Entry {
                value: Value::String(Bytes::from(new_val.to_string())),
                expires_at_ms,
            },
        );
        Ok(new_val)
    }
}
