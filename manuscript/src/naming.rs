use std::collections::HashMap;

/// Hands out `"<title> <n>"` test names.
///
/// Counters are per title and live as long as the namer, so one namer per
/// run gives names that stay unique across every document of that run.
#[derive(Debug, Default)]
pub struct TestNamer {
    counters: HashMap<String, usize>,
}

impl TestNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, title: &str) -> String {
        let counter = self.counters.entry(title.to_string()).or_insert(0);
        *counter += 1;
        format!("{} {}", title, counter)
    }
}
