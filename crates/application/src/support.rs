/// Builds a human title from a uri key or column name (`publish-posts` → `Publish Posts`).
#[must_use]
pub fn title_from_key(key: &str) -> String {
    key.split(['-', '_', '.'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut characters = part.chars();
            match characters.next() {
                Some(first) => first.to_uppercase().chain(characters).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the lowercase label used in validation messages (`published_at` → `published at`).
#[must_use]
pub fn attribute_label(field: &str) -> String {
    field.replace(['_', '-'], " ")
}

#[cfg(test)]
mod tests {
    use super::{attribute_label, title_from_key};

    #[test]
    fn titles_split_on_separators() {
        assert_eq!(title_from_key("publish-posts"), "Publish Posts");
        assert_eq!(title_from_key("created_at"), "Created At");
        assert_eq!(attribute_label("published_at"), "published at");
    }
}
