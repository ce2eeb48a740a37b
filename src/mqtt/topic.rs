//! MQTT topic filter matching
//!
//! Used by the broker to route responses to subscribed sessions. Supports
//! single-level (+) and multi-level (#) wildcards.

/// Topic matcher for MQTT topic filters
#[derive(Debug, Clone, Default)]
pub struct TopicMatcher;

impl TopicMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Check if a topic matches a topic filter
    ///
    /// * `+` matches exactly one topic level
    /// * `#` matches zero or more trailing levels
    ///
    /// ```
    /// use mqtt_stream_input::mqtt::TopicMatcher;
    ///
    /// let matcher = TopicMatcher::new();
    /// assert!(matcher.matches("input/abc/response", "input/+/response"));
    /// assert!(matcher.matches("input/abc/response", "input/#"));
    /// assert!(!matcher.matches("input/abc/write", "input/+/response"));
    /// ```
    pub fn matches(&self, topic: &str, filter: &str) -> bool {
        let mut topic_levels = topic.split('/');
        let mut filter_levels = filter.split('/').peekable();

        while let Some(f_level) = filter_levels.next() {
            if f_level == "#" {
                return filter_levels.peek().is_none();
            }
            match topic_levels.next() {
                Some(t_level) if f_level == "+" || f_level == t_level => {}
                _ => return false,
            }
        }

        topic_levels.next().is_none()
    }

    /// Check if a subscription filter is well formed
    ///
    /// `#` must be the whole last level and `+` a whole level. Empty
    /// levels are allowed.
    pub fn is_valid_filter(&self, filter: &str) -> bool {
        if filter.is_empty() {
            return false;
        }

        let levels: Vec<&str> = filter.split('/').collect();
        let last = levels.len() - 1;

        levels.iter().enumerate().all(|(i, level)| {
            (!level.contains('#') || (*level == "#" && i == last))
                && (!level.contains('+') || *level == "+")
        })
    }

    /// Check if a publish topic name is valid (no wildcards, not empty)
    pub fn is_valid_topic(&self, topic: &str) -> bool {
        !topic.is_empty() && !topic.contains(['+', '#'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let matcher = TopicMatcher::new();
        assert!(matcher.matches("input/pub/response", "input/pub/response"));
        assert!(!matcher.matches("input/pub/response", "input/other/response"));
    }

    #[test]
    fn test_single_level_wildcard() {
        let matcher = TopicMatcher::new();

        assert!(matcher.matches("input/pub", "input/+"));
        assert!(matcher.matches("input/pub/response", "+/pub/response"));

        // + requires exactly one level
        assert!(!matcher.matches("input", "input/+"));
        assert!(!matcher.matches("input/pub/response", "input/+"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        let matcher = TopicMatcher::new();

        assert!(matcher.matches("input", "input/#"));
        assert!(matcher.matches("input/pub", "input/#"));
        assert!(matcher.matches("input/pub/response", "input/#"));
        assert!(matcher.matches("anything/at/all", "#"));
        assert!(!matcher.matches("output/pub", "input/#"));
    }

    #[test]
    fn test_valid_filters() {
        let matcher = TopicMatcher::new();

        assert!(matcher.is_valid_filter("input/+/response"));
        assert!(matcher.is_valid_filter("input/#"));
        assert!(matcher.is_valid_filter("#"));
        assert!(matcher.is_valid_filter("input//response"));
        assert!(matcher.is_valid_filter("/+"));

        assert!(!matcher.is_valid_filter(""));
        assert!(!matcher.is_valid_filter("input/pub+"));
        assert!(!matcher.is_valid_filter("input/#/response"));
        assert!(!matcher.is_valid_filter("input/pub#"));
    }

    #[test]
    fn test_valid_topics() {
        let matcher = TopicMatcher::new();

        assert!(matcher.is_valid_topic("input/pub/write/prv"));
        // Empty levels are legal in topic names; the command grammar decides
        assert!(matcher.is_valid_topic("input//write"));

        assert!(!matcher.is_valid_topic(""));
        assert!(!matcher.is_valid_topic("input/+/write"));
        assert!(!matcher.is_valid_topic("input/#"));
    }
}
