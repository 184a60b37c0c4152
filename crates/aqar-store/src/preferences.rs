//! Marketplace selectors persisted in local storage.

use aqar_shared::constants::{COUNTRY_KEY, CURRENCY_KEY};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Selected country id. Unparseable values read as unset.
    pub fn selected_country(&self) -> Result<Option<u64>> {
        Ok(self
            .get_item(COUNTRY_KEY)?
            .and_then(|raw| raw.trim().parse().ok()))
    }

    pub fn set_selected_country(&self, country_id: u64) -> Result<()> {
        self.set_item(COUNTRY_KEY, &country_id.to_string())
    }

    pub fn selected_currency(&self) -> Result<Option<String>> {
        Ok(self.get_item(CURRENCY_KEY)?.filter(|c| !c.is_empty()))
    }

    pub fn set_selected_currency(&self, code: &str) -> Result<()> {
        self.set_item(CURRENCY_KEY, &code.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_and_currency() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.selected_country().unwrap(), None);
        assert_eq!(db.selected_currency().unwrap(), None);

        db.set_selected_country(3).unwrap();
        db.set_selected_currency("sar").unwrap();
        assert_eq!(db.selected_country().unwrap(), Some(3));
        assert_eq!(db.selected_currency().unwrap().as_deref(), Some("SAR"));

        db.set_item(COUNTRY_KEY, "not-a-number").unwrap();
        assert_eq!(db.selected_country().unwrap(), None);
    }
}
