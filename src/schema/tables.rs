//! Declared source tables.

use super::{ColumnSpec as C, DatePart, Derivation, DerivedSpec as D, TableSchema};
use crate::model::ColumnType::{Boolean, Date, Decimal, Integer};

/// Order status labels as exported by the provider.
pub const ORDER_STATUS_LABELS: &[(&str, i64)] =
    &[("New", 0), ("Invoiced", 1), ("Shipped", 2), ("Closed", 3)];

pub static ORDERS: TableSchema = TableSchema {
    name: super::ORDERS,
    source_name: "Orders",
    columns: &[
        C::new("Order ID", "order_id", Integer),
        C::text("Employee", "employee_name"),
        C::text("Customer", "customer_company"),
        C::new("Order Date", "order_date", Date),
        C::new("Shipped Date", "shipped_date", Date),
        C::text("Ship Via", "shipping_company"),
        C::text("Ship Name", "ship_name"),
        C::text("Ship Address", "ship_address"),
        C::text("Ship City", "ship_city"),
        C::text("Ship State/Province", "ship_state"),
        C::text("Ship ZIP/Postal Code", "ship_zip"),
        C::text("Ship Country/Region", "ship_country"),
        C::new("Shipping Fee", "shipping_fee", Decimal).zero_fallback(),
        C::new("Taxes", "taxes", Decimal).zero_fallback(),
        C::text("Payment Type", "payment_type"),
        C::new("Paid Date", "paid_date", Date),
        C::text("Notes", "notes"),
        C::new("Tax Rate", "tax_rate", Decimal).zero_fallback(),
        C::text("Tax Status", "tax_status"),
        C::new("Status ID", "status_id", Integer).lookup(ORDER_STATUS_LABELS, 0),
    ],
    derived: &[
        D::new(
            "delivery_days",
            Derivation::DaysBetween {
                start: "order_date",
                end: "shipped_date",
            },
        ),
        D::new(
            "order_year",
            Derivation::DatePart {
                source: "order_date",
                part: DatePart::Year,
            },
        ),
        D::new(
            "order_month",
            Derivation::DatePart {
                source: "order_date",
                part: DatePart::Month,
            },
        ),
        D::new(
            "order_quarter",
            Derivation::DatePart {
                source: "order_date",
                part: DatePart::Quarter,
            },
        ),
        D::new(
            "order_day_name",
            Derivation::DatePart {
                source: "order_date",
                part: DatePart::DayName,
            },
        ),
    ],
};

pub static ORDER_DETAILS: TableSchema = TableSchema {
    name: super::ORDER_DETAILS,
    source_name: "Order Details",
    columns: &[
        C::new("ID", "order_detail_id", Integer),
        C::new("Order ID", "order_id", Integer),
        C::text("Product", "product_name"),
        C::new("Quantity", "quantity", Decimal).zero_fallback(),
        C::new("Unit Price", "unit_price", Decimal).zero_fallback(),
        C::new("Discount", "discount", Decimal)
            .zero_fallback()
            .default_value(0.0),
        C::text("Status ID", "status_id"),
        C::new("Date Allocated", "date_allocated", Date),
        C::new("Purchase Order ID", "purchase_order_id", Integer),
        C::new("Inventory ID", "inventory_id", Integer),
    ],
    derived: &[D::new(
        "line_total",
        Derivation::LineTotal {
            quantity: "quantity",
            unit_price: "unit_price",
            discount: "discount",
        },
    )],
};

pub static PRODUCTS: TableSchema = TableSchema {
    name: super::PRODUCTS,
    source_name: "Products",
    columns: &[
        C::new("ID", "product_id", Integer),
        C::text("Product Code", "product_code"),
        C::text("Product Name", "product_name"),
        C::text("Description", "description"),
        C::new("Standard Cost", "standard_cost", Decimal),
        C::new("List Price", "list_price", Decimal).zero_fallback(),
        C::new("Reorder Level", "reorder_level", Integer),
        C::new("Target Level", "target_level", Integer),
        C::text("Quantity Per Unit", "quantity_per_unit"),
        C::new("Discontinued", "discontinued", Boolean),
        C::new("Minimum Reorder Quantity", "min_reorder_quantity", Integer),
        C::text("Category", "category"),
    ],
    derived: &[
        D::new(
            "profit_margin",
            Derivation::Difference {
                minuend: "list_price",
                subtrahend: "standard_cost",
            },
        ),
        D::new(
            "margin_percentage",
            Derivation::Percentage {
                numerator: "profit_margin",
                denominator: "list_price",
            },
        ),
    ],
};

pub static CUSTOMERS: TableSchema = TableSchema {
    name: super::CUSTOMERS,
    source_name: "Customers",
    columns: &[
        C::new("ID", "customer_id", Integer),
        C::text("Company", "company_name"),
        C::text("Last Name", "last_name"),
        C::text("First Name", "first_name"),
        C::text("E-mail Address", "email"),
        C::text("Job Title", "job_title"),
        C::text("Business Phone", "business_phone"),
        C::text("Address", "address"),
        C::text("City", "city"),
        C::text("State/Province", "state"),
        C::text("ZIP/Postal Code", "zip_code"),
        C::text("Country/Region", "country"),
    ],
    derived: &[
        D::new(
            "customer_name",
            Derivation::Concat {
                parts: &["first_name", "last_name"],
                separator: " ",
            },
        ),
        D::new(
            "region",
            Derivation::Concat {
                parts: &["state", "country"],
                separator: ", ",
            },
        ),
    ],
};

pub static EMPLOYEES: TableSchema = TableSchema {
    name: super::EMPLOYEES,
    source_name: "Employees",
    columns: &[
        C::new("ID", "employee_id", Integer),
        C::text("Last Name", "last_name"),
        C::text("First Name", "first_name"),
        C::text("E-mail Address", "email"),
        C::text("Job Title", "job_title"),
        C::text("Business Phone", "business_phone"),
        C::text("Address", "address"),
        C::text("City", "city"),
        C::text("State/Province", "state"),
        C::text("ZIP/Postal Code", "zip_code"),
        C::text("Country/Region", "country"),
        C::text("Notes", "notes"),
    ],
    derived: &[
        D::new(
            "employee_name",
            Derivation::Concat {
                parts: &["first_name", "last_name"],
                separator: " ",
            },
        ),
        D::new(
            "full_address",
            Derivation::Concat {
                parts: &["address", "city", "state"],
                separator: ", ",
            },
        ),
        D::new(
            "languages",
            Derivation::Extract {
                source: "notes",
                pattern: r"Fluent in [A-Za-z, ]+",
            },
        ),
    ],
};

/// Every standard table, in fact-build dependency order.
pub static ALL: &[&TableSchema] = &[&ORDER_DETAILS, &ORDERS, &PRODUCTS, &CUSTOMERS, &EMPLOYEES];
