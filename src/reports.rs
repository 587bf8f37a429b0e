use tracing::debug;

use crate::error::Result;
use crate::permission::{Capability, Gate};
use crate::session::Session;
use crate::time;
use crate::types::Statistics;
use crate::Library;

impl Library {
	pub async fn statistics(&self, session: &Session) -> Result<Statistics> {
		session.require(Gate::Capability(Capability::ViewReports))?;
		let stats = sqlx::query_as::<_, Statistics>(
			"SELECT \
			(SELECT COUNT(*) FROM books) AS titles, \
			(SELECT COALESCE(SUM(quantity), 0) FROM books) AS copies, \
			(SELECT COUNT(*) FROM loans WHERE return_date IS NULL) AS active_loans, \
			(SELECT COUNT(*) FROM loans WHERE return_date IS NULL AND due_date < ?) AS overdue_loans, \
			(SELECT COUNT(*) FROM users) AS users",
		)
			.bind(time::today())
			.fetch_one(self.db.pool())
			.await?;
		debug!(?stats, "statistics");
		Ok(stats)
	}
}
