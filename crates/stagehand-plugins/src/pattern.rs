/// Case-sensitive file-name glob where `*` matches any run of characters.
/// Anything else matches literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    pattern: String,
}

impl FilePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Matches every dynamic library for the current platform.
    pub fn platform_dylibs() -> Self {
        Self::new(format!("*{}", std::env::consts::DLL_SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, file_name: &str) -> bool {
        glob_match(&self.pattern, file_name)
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    // Iterative matcher with single-star backtracking.
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < txt.len() {
        if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if p < pat.len() && pat[p] == txt[t] {
            p += 1;
            t += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_star_patterns() {
        assert!(FilePattern::new("libfoo.so").matches("libfoo.so"));
        assert!(!FilePattern::new("libfoo.so").matches("libfoo.so.1"));
        assert!(FilePattern::new("*.so").matches("libfoo.so"));
        assert!(!FilePattern::new("*.so").matches("libfoo.dll"));
        assert!(FilePattern::new("lib*stage*").matches("libmy_stage_runner.so"));
        assert!(FilePattern::new("*").matches("anything"));
        assert!(!FilePattern::new("").matches("x"));
        assert!(FilePattern::new("").matches(""));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!FilePattern::new("*.SO").matches("libfoo.so"));
        assert!(!FilePattern::new("LibFoo.so").matches("libfoo.so"));
    }
}
