/// Collapse whitespace in a query and rewrite `?` placeholders into Postgres
/// positional parameters (`$1`, `$2`, ...), so queries can be written in the
/// indented, unnumbered style used across the repositories.
pub fn sql(query: &str) -> String {
    let cleaned = query.split_whitespace().collect::<Vec<&str>>().join(" ");
    let mut result = String::with_capacity(cleaned.len() + 8);
    let mut param_index = 1;

    for ch in cleaned.chars() {
        if ch == '?' {
            result.push('$');
            result.push_str(&param_index.to_string());
            param_index += 1;
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::sql;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbers_placeholders_in_order() {
        let query = sql(r#"
            UPDATE
                teacher_payments
            SET
                bonuses = ?,
                version = version + 1
            WHERE
                id = ?
                AND version = ?
        "#);

        assert_eq!(
            query,
            "UPDATE teacher_payments SET bonuses = $1, version = version + 1 WHERE id = $2 AND version = $3"
        );
    }
}
