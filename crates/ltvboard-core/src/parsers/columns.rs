//! Column detection over heterogeneous order exports
//!
//! Every role (order date, customer id, amount, ...) carries a ranked
//! strategy:
//! 1. exact, case-sensitive header names tried in list order
//! 2. case-insensitive keyword containment, first header in file order wins,
//!    headers containing an exclusion keyword are skipped
//!
//! [`ColumnResolver::resolve`] runs the strategy once over a header set. When
//! a role stays unresolved (or the resolved cell is blank) callers use
//! [`ResolvedColumns::value`], which re-runs the same strategy on the
//! individual row.

use crate::models::RawRow;
use std::collections::HashMap;

/// A field the ingestion pipeline wants to locate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    OrderDate,
    CustomerId,
    Amount,
    OrderId,
    Email,
    LastName,
    FirstName,
    ItemCode,
    ItemName,
    ItemPrice,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::OrderDate,
        Role::CustomerId,
        Role::Amount,
        Role::OrderId,
        Role::Email,
        Role::LastName,
        Role::FirstName,
        Role::ItemCode,
        Role::ItemName,
        Role::ItemPrice,
    ];

    pub fn strategy(self) -> &'static RoleStrategy {
        match self {
            Role::OrderDate => &ORDER_DATE,
            Role::CustomerId => &CUSTOMER_ID,
            Role::Amount => &AMOUNT,
            Role::OrderId => &ORDER_ID,
            Role::Email => &EMAIL,
            Role::LastName => &LAST_NAME,
            Role::FirstName => &FIRST_NAME,
            Role::ItemCode => &ITEM_CODE,
            Role::ItemName => &ITEM_NAME,
            Role::ItemPrice => &ITEM_PRICE,
        }
    }
}

/// Monetary columns that must never be read as the order amount
const MONEY_EXCLUSIONS: &[&str] = &["税", "tax", "ポイント", "point", "送料", "shipping"];

/// Ranked header candidates for one role
#[derive(Debug)]
pub struct RoleStrategy {
    /// Exact header names, highest priority first
    pub exact: &'static [&'static str],
    /// Lowercase substrings matched against lowercased headers
    pub keywords: &'static [&'static str],
    /// Lowercase substrings that disqualify a header in the keyword pass
    pub exclusions: &'static [&'static str],
}

static ORDER_DATE: RoleStrategy = RoleStrategy {
    exact: &[
        "注文日", "注文日時", "購入日", "日付", "order_date", "Order Date", "date", "受注日",
        "受注日時",
    ],
    keywords: &["注文日", "購入日", "日付", "date", "受注日"],
    exclusions: &[],
};

static CUSTOMER_ID: RoleStrategy = RoleStrategy {
    exact: &[
        "顧客ID", "会員ID", "ユーザーID", "購入者ID", "customer_id", "Customer ID", "user_id",
        "member_id", "Member ID", "購入者コード",
    ],
    keywords: &["会員", "顧客", "customer", "member", "user", "購入者"],
    exclusions: &["mail", "メール", "name", "名"],
};

static AMOUNT: RoleStrategy = RoleStrategy {
    exact: &[
        "金額", "合計金額", "支払金額", "amount", "Amount", "total", "Total", "合計", "支払額",
        "売上金額",
    ],
    keywords: &["金額", "合計", "支払", "amount", "total", "price", "価格", "売上"],
    exclusions: MONEY_EXCLUSIONS,
};

static ORDER_ID: RoleStrategy = RoleStrategy {
    exact: &[
        "注文番号", "受注番号", "order_id", "Order ID", "order_no", "Order No", "order_number",
    ],
    keywords: &[
        "注文番号", "受注番号", "order_id", "order id", "order_no", "order no", "order_number",
        "ordernumber",
    ],
    exclusions: &[],
};

static EMAIL: RoleStrategy = RoleStrategy {
    exact: &["メールアドレス", "注文者メールアドレス", "email", "Email", "E-mail"],
    keywords: &["mail", "メール"],
    exclusions: &[],
};

static LAST_NAME: RoleStrategy = RoleStrategy {
    exact: &["注文者名字", "名字", "姓", "last_name", "Last Name", "lastName"],
    keywords: &["名字", "last_name", "last name", "lastname", "surname"],
    exclusions: &[],
};

static FIRST_NAME: RoleStrategy = RoleStrategy {
    exact: &["注文者名前", "名前", "名", "first_name", "First Name", "firstName"],
    keywords: &["名前", "first_name", "first name", "firstname", "given"],
    exclusions: &["商品"],
};

static ITEM_CODE: RoleStrategy = RoleStrategy {
    exact: &[
        "商品管理番号", "商品番号", "商品コード", "item_code", "Item Code", "sku", "SKU",
        "product_id",
    ],
    keywords: &[
        "商品管理番号", "商品番号", "商品コード", "item_code", "item code", "sku", "product_id",
        "product code",
    ],
    exclusions: &[],
};

static ITEM_NAME: RoleStrategy = RoleStrategy {
    exact: &["商品名", "item_name", "Item Name", "product_name", "Product Name"],
    keywords: &["商品名", "item_name", "item name", "product_name", "product name"],
    exclusions: &[],
};

static ITEM_PRICE: RoleStrategy = RoleStrategy {
    exact: &[
        "単価", "商品単価", "unit_price", "Unit Price", "item_price", "price", "Price",
    ],
    keywords: &["単価", "unit_price", "unit price", "item_price", "price"],
    exclusions: MONEY_EXCLUSIONS,
};

impl RoleStrategy {
    /// Best header for this role among `headers` (file order)
    pub fn match_headers<'a, I>(&self, headers: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let headers: Vec<&'a str> = headers.into_iter().collect();

        if let Some(found) = self
            .exact
            .iter()
            .find_map(|name| headers.iter().copied().find(|h| h == name))
        {
            return Some(found);
        }

        headers.into_iter().find(|h| self.keyword_match(h))
    }

    /// Per-row fallback: same two passes, only non-empty cells count
    pub fn match_row<'r>(&self, row: &'r RawRow) -> Option<&'r str> {
        if let Some(value) = self.exact.iter().find_map(|name| row.non_empty(name)) {
            return Some(value);
        }

        row.fields()
            .filter(|(header, _)| self.keyword_match(header))
            .map(|(_, value)| value.trim())
            .find(|value| !value.is_empty())
    }

    fn keyword_match(&self, header: &str) -> bool {
        let lower = header.to_lowercase();
        if self.exclusions.iter().any(|ex| lower.contains(ex)) {
            return false;
        }
        self.keywords.iter().any(|kw| lower.contains(kw))
    }
}

/// Header chosen per role for one input file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    columns: HashMap<Role, String>,
}

impl ResolvedColumns {
    pub fn get(&self, role: Role) -> Option<&str> {
        self.columns.get(&role).map(String::as_str)
    }

    pub fn is_resolved(&self, role: Role) -> bool {
        self.columns.contains_key(&role)
    }

    /// Cell for `role` in `row`: resolved column first, per-row search second
    pub fn value<'r>(&self, row: &'r RawRow, role: Role) -> Option<&'r str> {
        self.get(role)
            .and_then(|header| row.non_empty(header))
            .or_else(|| role.strategy().match_row(row))
    }

    /// Roles that could not be mapped to any header
    pub fn unresolved(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| !self.is_resolved(*role))
            .collect()
    }
}

/// Resolves role -> header over a set of rows sharing one header line
pub struct ColumnResolver;

impl ColumnResolver {
    /// Resolve every role against the header set of the first row
    ///
    /// Empty input resolves nothing; callers then rely on per-row search.
    pub fn resolve(rows: &[RawRow]) -> ResolvedColumns {
        let Some(first) = rows.first() else {
            return ResolvedColumns::default();
        };
        Self::resolve_headers(first.headers())
    }

    pub fn resolve_headers<'a, I>(headers: I) -> ResolvedColumns
    where
        I: IntoIterator<Item = &'a str>,
    {
        let headers: Vec<&str> = headers.into_iter().collect();
        let columns = Role::ALL
            .into_iter()
            .filter_map(|role| {
                role.strategy()
                    .match_headers(headers.iter().copied())
                    .map(|header| (role, header.to_string()))
            })
            .collect();
        ResolvedColumns { columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_follows_candidate_rank() {
        // "合計金額" ranks above "合計" even though it appears later in the file
        let resolved = ColumnResolver::resolve_headers(["合計", "合計金額"]);
        assert_eq!(resolved.get(Role::Amount), Some("合計金額"));
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        // "ORDER_DATE" is not an exact candidate; the keyword pass finds it
        let resolved = ColumnResolver::resolve_headers(["id", "ORDER_DATE"]);
        assert_eq!(resolved.get(Role::OrderDate), Some("ORDER_DATE"));
    }

    #[test]
    fn test_keyword_pass_uses_file_order() {
        let resolved = ColumnResolver::resolve_headers(["Purchase Date", "Delivery Date"]);
        assert_eq!(resolved.get(Role::OrderDate), Some("Purchase Date"));
    }

    #[test]
    fn test_amount_exclusions_take_precedence() {
        let resolved =
            ColumnResolver::resolve_headers(["Tax Amount", "Shipping Total", "Grand Total Paid"]);
        assert_eq!(resolved.get(Role::Amount), Some("Grand Total Paid"));

        let resolved = ColumnResolver::resolve_headers(["消費税合計", "ポイント利用額", "請求金額"]);
        assert_eq!(resolved.get(Role::Amount), Some("請求金額"));
    }

    #[test]
    fn test_unresolved_roles_are_empty() {
        let resolved = ColumnResolver::resolve_headers(["foo", "bar"]);
        assert_eq!(resolved.get(Role::OrderDate), None);
        assert_eq!(resolved.get(Role::Amount), None);
        assert!(resolved.unresolved().contains(&Role::CustomerId));
    }

    #[test]
    fn test_resolve_empty_rows() {
        let resolved = ColumnResolver::resolve(&[]);
        assert!(resolved.unresolved().len() == Role::ALL.len());
    }

    #[test]
    fn test_value_falls_back_per_row() {
        let header_row = RawRow::from_pairs([("x", "1")]);
        let resolved = ColumnResolver::resolve(&[header_row]);

        let row = RawRow::from_pairs([("Member ID", "M-9"), ("Order Date", "2024-03-05")]);
        assert_eq!(resolved.value(&row, Role::CustomerId), Some("M-9"));
        assert_eq!(resolved.value(&row, Role::OrderDate), Some("2024-03-05"));
    }

    #[test]
    fn test_value_skips_blank_resolved_cell() {
        let rows = vec![RawRow::from_pairs([("顧客ID", ""), ("会員ID", "K-1")])];
        let resolved = ColumnResolver::resolve(&rows);
        assert_eq!(resolved.get(Role::CustomerId), Some("顧客ID"));
        assert_eq!(resolved.value(&rows[0], Role::CustomerId), Some("K-1"));
    }

    #[test]
    fn test_customer_keyword_ignores_email_and_name() {
        let resolved =
            ColumnResolver::resolve_headers(["customer_email", "customer_name", "CustomerNo"]);
        assert_eq!(resolved.get(Role::CustomerId), Some("CustomerNo"));
        assert_eq!(resolved.get(Role::Email), Some("customer_email"));
    }

    #[test]
    fn test_marketplace_headers() {
        let resolved = ColumnResolver::resolve_headers([
            "受注番号",
            "注文日時",
            "注文者名字",
            "注文者名前",
            "注文者メールアドレス",
            "商品管理番号",
            "商品名",
            "単価",
            "送料",
        ]);
        assert_eq!(resolved.get(Role::OrderId), Some("受注番号"));
        assert_eq!(resolved.get(Role::OrderDate), Some("注文日時"));
        assert_eq!(resolved.get(Role::LastName), Some("注文者名字"));
        assert_eq!(resolved.get(Role::FirstName), Some("注文者名前"));
        assert_eq!(resolved.get(Role::Email), Some("注文者メールアドレス"));
        assert_eq!(resolved.get(Role::ItemCode), Some("商品管理番号"));
        assert_eq!(resolved.get(Role::ItemName), Some("商品名"));
        assert_eq!(resolved.get(Role::ItemPrice), Some("単価"));
    }
}
