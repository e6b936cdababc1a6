//! # Report Repository
//!
//! Read-only aggregates. Ranges are inclusive calendar days over
//! `date(created_at)`. Refunded sales never count as revenue.
//!
//! ```text
//! ┌───────────────────────┬──────────────────────────────────────────────┐
//! │ dashboard(today)      │ catalog, stock value, today/month sales,     │
//! │                       │ repairs per status, wallet balances          │
//! │ top_products          │ Σ line total per product, descending         │
//! │ inventory_status      │ out / low / ok per active product            │
//! │ financial_summary     │ revenue, discount, profit, cost              │
//! │ repairs_throughput    │ per status: count, Σ and mean estimate       │
//! │ wallet_activity       │ per provider: count, volume, fees, balance   │
//! │ daily / monthly_sales │ count and gross per bucket                   │
//! └───────────────────────┴──────────────────────────────────────────────┘
//! ```

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::FromRow;

use cellpos_core::{
    BalanceScope, DateRange, Money, RepairStatus, StockStatus, WalletProvider,
};

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::wallet::WalletBalance;

/// Sale count and gross for a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct PeriodSales {
    pub count: i64,
    pub gross: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct RepairStatusCount {
    pub status: RepairStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub active_products: i64,
    pub inventory_units: i64,
    pub low_stock_count: i64,
    pub inventory_value: Money,
    pub today: PeriodSales,
    pub month: PeriodSales,
    pub repairs_by_status: Vec<RepairStatusCount>,
    pub wallet_balances: Vec<WalletBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub quantity: i64,
    pub revenue: Money,
    pub profit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryStatusRow {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub current_qty: i64,
    /// `min_stock`, or the `low_stock_threshold` setting when it is zero.
    pub effective_min_stock: i64,
    pub stock_value: Money,
    pub status: StockStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FinancialSummary {
    pub sale_count: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    /// Σ total.
    pub net_revenue: Money,
    pub average_sale: Money,
    pub profit: Money,
    /// Σ (line total − line profit).
    pub cost: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepairThroughput {
    pub status: RepairStatus,
    pub count: i64,
    pub total_estimated: Money,
    pub average_estimated: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletActivity {
    pub provider: WalletProvider,
    pub count: i64,
    /// Σ |amount| within the range.
    pub volume: Money,
    pub fees: Money,
    /// Σ amount over all time.
    pub balance: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub count: i64,
    pub gross: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct MonthlySales {
    /// `YYYY-MM`.
    pub month: String,
    pub count: i64,
    pub gross: Money,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    db: Database,
}

impl ReportRepository {
    pub fn new(db: Database) -> Self {
        ReportRepository { db }
    }

    pub async fn dashboard(&self, today: NaiveDate) -> DbResult<DashboardStats> {
        let threshold = self.db.settings().low_stock_threshold().await;
        let pool = self.db.pool();

        let (active_products, inventory_units, inventory_value, low_stock_count): (i64, i64, Money, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(current_qty), 0),
                    COALESCE(SUM(current_qty * buy_price), 0),
                    COALESCE(SUM(current_qty <= CASE WHEN min_stock > 0 THEN min_stock ELSE ?1 END), 0)
                FROM products
                WHERE active = 1
                "#,
            )
            .bind(threshold)
            .fetch_one(pool)
            .await?;

        let today_sales = self.period_sales(DateRange::day(today)).await?;
        let month_start = today.with_day(1).unwrap_or(today);
        let month_sales = self.period_sales(DateRange::new(month_start, today)).await?;

        let repairs_by_status = sqlx::query_as::<_, RepairStatusCount>(
            "SELECT status, COUNT(*) AS count FROM repairs GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await?;

        let wallet_balances = self.db.wallet().balances(BalanceScope::All).await?;

        Ok(DashboardStats {
            active_products,
            inventory_units,
            low_stock_count,
            inventory_value,
            today: today_sales,
            month: month_sales,
            repairs_by_status,
            wallet_balances,
        })
    }

    /// Products by revenue within `range`, highest first.
    pub async fn top_products(&self, range: DateRange, limit: i64) -> DbResult<Vec<TopProduct>> {
        let rows = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                si.product_id,
                MAX(si.product_name) AS product_name,
                MAX(si.sku) AS sku,
                SUM(si.qty) AS quantity,
                SUM(si.total) AS revenue,
                SUM(si.profit) AS profit
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            WHERE s.is_refunded = 0
              AND date(s.created_at) BETWEEN ?1 AND ?2
            GROUP BY si.product_id
            ORDER BY revenue DESC, quantity DESC
            LIMIT ?3
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Every active product with its stock classification, by name.
    pub async fn inventory_status(&self) -> DbResult<Vec<InventoryStatusRow>> {
        let threshold = self.db.settings().low_stock_threshold().await;
        let rows: Vec<(String, String, String, String, i64, i64, Money)> = sqlx::query_as(
            r#"
            SELECT id, sku, name, category, current_qty, min_stock, buy_price
            FROM products
            WHERE active = 1
            ORDER BY name COLLATE NOCASE, sku
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let rows = rows
            .into_iter()
            .map(|(product_id, sku, name, category, current_qty, min_stock, buy_price)| {
                let effective_min_stock = if min_stock > 0 { min_stock } else { threshold };
                InventoryStatusRow {
                    product_id,
                    sku,
                    name,
                    category,
                    current_qty,
                    effective_min_stock,
                    stock_value: buy_price.multiply_quantity(current_qty),
                    status: StockStatus::classify(current_qty, effective_min_stock),
                }
            })
            .collect();
        Ok(rows)
    }

    pub async fn financial_summary(&self, range: DateRange) -> DbResult<FinancialSummary> {
        let pool = self.db.pool();
        let (sale_count, subtotal, discount, tax, net_revenue): (i64, Money, Money, Money, Money) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(subtotal), 0),
                    COALESCE(SUM(discount), 0),
                    COALESCE(SUM(tax), 0),
                    COALESCE(SUM(total), 0)
                FROM sales
                WHERE is_refunded = 0 AND date(created_at) BETWEEN ?1 AND ?2
                "#,
            )
            .bind(range.from)
            .bind(range.to)
            .fetch_one(pool)
            .await?;

        let (line_total, profit): (Money, Money) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(si.total), 0), COALESCE(SUM(si.profit), 0)
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            WHERE s.is_refunded = 0 AND date(s.created_at) BETWEEN ?1 AND ?2
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(pool)
        .await?;

        Ok(FinancialSummary {
            sale_count,
            subtotal,
            discount,
            tax,
            net_revenue,
            average_sale: average(net_revenue, sale_count),
            profit,
            cost: line_total - profit,
        })
    }

    /// Tickets received within `range`, grouped by current status.
    pub async fn repairs_throughput(&self, range: DateRange) -> DbResult<Vec<RepairThroughput>> {
        let rows: Vec<(RepairStatus, i64, Money)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(estimated_cost), 0)
            FROM repairs
            WHERE date(created_at) BETWEEN ?1 AND ?2
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count, total_estimated)| RepairThroughput {
                status,
                count,
                total_estimated,
                average_estimated: average(total_estimated, count),
            })
            .collect())
    }

    /// One row per provider, including idle ones.
    pub async fn wallet_activity(&self, range: DateRange) -> DbResult<Vec<WalletActivity>> {
        let rows: Vec<(WalletProvider, i64, Money, Money)> = sqlx::query_as(
            r#"
            SELECT provider, COUNT(*), COALESCE(SUM(ABS(amount)), 0), COALESCE(SUM(fees), 0)
            FROM wallet_transactions
            WHERE date(created_at) BETWEEN ?1 AND ?2
            GROUP BY provider
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(self.db.pool())
        .await?;

        let balances = self.db.wallet().balances(BalanceScope::All).await?;

        Ok(balances
            .into_iter()
            .map(|b| {
                let (count, volume, fees) = rows
                    .iter()
                    .find(|(p, _, _, _)| *p == b.provider)
                    .map(|&(_, count, volume, fees)| (count, volume, fees))
                    .unwrap_or((0, Money::zero(), Money::zero()));
                WalletActivity {
                    provider: b.provider,
                    count,
                    volume,
                    fees,
                    balance: b.balance,
                }
            })
            .collect())
    }

    /// Days with at least one sale, oldest first.
    pub async fn daily_sales(&self, range: DateRange) -> DbResult<Vec<DailySales>> {
        let rows = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT date(created_at) AS day, COUNT(*) AS count, COALESCE(SUM(total), 0) AS gross
            FROM sales
            WHERE is_refunded = 0 AND date(created_at) BETWEEN ?1 AND ?2
            GROUP BY date(created_at)
            ORDER BY day
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Months of `year` with at least one sale.
    pub async fn monthly_sales(&self, year: i32) -> DbResult<Vec<MonthlySales>> {
        let rows = sqlx::query_as::<_, MonthlySales>(
            r#"
            SELECT strftime('%Y-%m', created_at) AS month, COUNT(*) AS count,
                   COALESCE(SUM(total), 0) AS gross
            FROM sales
            WHERE is_refunded = 0 AND strftime('%Y', created_at) = ?1
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(format!("{year:04}"))
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    async fn period_sales(&self, range: DateRange) -> DbResult<PeriodSales> {
        let sales = sqlx::query_as::<_, PeriodSales>(
            r#"
            SELECT COUNT(*) AS count, COALESCE(SUM(total), 0) AS gross
            FROM sales
            WHERE is_refunded = 0 AND date(created_at) BETWEEN ?1 AND ?2
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(self.db.pool())
        .await?;
        Ok(sales)
    }
}

fn average(sum: Money, count: i64) -> Money {
    if count == 0 {
        Money::zero()
    } else {
        Money::from_units(sum.units() / count)
    }
}
