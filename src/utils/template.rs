// SPDX-License-Identifier: GPL-3.0-only

/// Substitute `value` for the first `{}` in a link template
pub fn fill_template(template: &str, value: &str) -> String {
    template.replacen("{}", value, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template() {
        assert_eq!(fill_template("http://host/maps/{}", "a.ufo"), "http://host/maps/a.ufo");
        assert_eq!(fill_template("{}/{}", "x"), "x/{}");
        assert_eq!(fill_template("http://host/static", "x"), "http://host/static");
    }
}
