//! Interactive text front end.
//!
//! Reads one answer per line from any `BufRead` and writes to any `Write`,
//! so the same loop drives a terminal and scripted tests. End of input
//! ends the session.

use crate::application::engine::PharmacyEngine;
use crate::application::session::Session;
use crate::domain::drug::Drug;
use crate::domain::prescription::PrescriptionDraft;
use crate::domain::transaction::PaymentMethod;
use crate::domain::user::{Permission, Role, User};
use crate::error::PharmacyError;
use rust_decimal::Decimal;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

const ALERT_RULE: &str = "!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!";

/// Result of one menu step: keep going, or the input is exhausted.
type Step = io::Result<bool>;

pub struct Console<'a, R, W> {
    engine: &'a PharmacyEngine,
    input: R,
    output: W,
    session: Session,
}

impl<'a, R: BufRead, W: Write> Console<'a, R, W> {
    pub fn new(engine: &'a PharmacyEngine, input: R, output: W) -> Self {
        Self {
            engine,
            input,
            output,
            session: Session::new(),
        }
    }

    pub async fn run(mut self) -> io::Result<()> {
        writeln!(self.output, "=== Pharmacy Workflow System ===")?;
        loop {
            let role = self.session.current_user().map(|u| u.role);
            let more = match role {
                None => self.login().await?,
                Some(Role::Admin) => self.admin_menu().await?,
                Some(Role::Doctor) => self.doctor_menu().await?,
                Some(Role::Pharmacist) => self.pharmacist_menu().await?,
                Some(Role::Billing) => self.billing_menu().await?,
            };
            if !more {
                break;
            }
        }
        writeln!(self.output, "Goodbye.")?;
        self.output.flush()
    }

    // --- Input helpers ---

    /// `None` at end of input.
    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prompts until the answer parses. `None` at end of input.
    fn prompt_parsed<T: FromStr>(&mut self, label: &str) -> io::Result<Option<T>> {
        loop {
            let Some(answer) = self.prompt(label)? else {
                return Ok(None);
            };
            match answer.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => writeln!(self.output, "Invalid value '{answer}', try again.")?,
            }
        }
    }

    fn show_error(&mut self, e: &PharmacyError) -> io::Result<()> {
        if e.is_security_alert() {
            writeln!(self.output, "{ALERT_RULE}")?;
            writeln!(self.output, "{e}")?;
            writeln!(self.output, "{ALERT_RULE}")
        } else {
            writeln!(self.output, "Error: {e}")
        }
    }

    /// Prints the denial when the current user lacks `permission`.
    fn allowed(&mut self, permission: Permission) -> io::Result<bool> {
        match self.session.authorize(permission) {
            Ok(_) => Ok(true),
            Err(e) => {
                self.show_error(&e)?;
                Ok(false)
            }
        }
    }

    fn menu(&mut self, title: &str, entries: &[&str]) -> io::Result<Option<String>> {
        writeln!(self.output, "\n=== {title} ===")?;
        for (i, entry) in entries.iter().enumerate() {
            writeln!(self.output, "{}. {entry}", i + 1)?;
        }
        self.prompt("Choice: ")
    }

    fn logout(&mut self) -> Step {
        self.session.logout();
        writeln!(self.output, "Logged out.")?;
        Ok(true)
    }

    // --- Login ---

    async fn login(&mut self) -> Step {
        writeln!(self.output, "\n=== LOGIN ===")?;
        let Some(username) = self.prompt("Username (or 'exit' to quit): ")? else {
            return Ok(false);
        };
        if username == "exit" {
            return Ok(false);
        }
        let Some(password) = self.prompt("Password: ")? else {
            return Ok(false);
        };
        if self.session.login(self.engine, &username, &password).await {
            let role = self.session.current_user().map(|u| u.role);
            if let Some(role) = role {
                writeln!(self.output, "Login successful. Role: {role}")?;
            }
        } else {
            writeln!(self.output, "Invalid credentials.")?;
        }
        Ok(true)
    }

    // --- Admin ---

    async fn admin_menu(&mut self) -> Step {
        let entries = [
            "Add User",
            "Generate System Report",
            "Check Epidemic Trends",
            "Run Integrity Audit",
            "Logout",
        ];
        let Some(choice) = self.menu("ADMIN DASHBOARD", &entries)? else {
            return Ok(false);
        };
        match choice.as_str() {
            "1" => self.add_user().await,
            "2" => self.system_report().await,
            "3" => self.epidemic_trends().await,
            "4" => self.integrity_audit().await,
            "5" => self.logout(),
            _ => self.invalid_choice(),
        }
    }

    async fn add_user(&mut self) -> Step {
        if !self.allowed(Permission::ManageUsers)? {
            return Ok(true);
        }
        let Some(username) = self.prompt("Username: ")? else {
            return Ok(false);
        };
        let Some(password) = self.prompt("Password: ")? else {
            return Ok(false);
        };
        let Some(role) =
            self.prompt_parsed::<Role>("Role (0:Admin, 1:Doctor, 2:Pharmacist, 3:Billing): ")?
        else {
            return Ok(false);
        };
        match self.engine.add_user(User::new(username, password, role)).await {
            Ok(()) => writeln!(self.output, "User added.")?,
            Err(e) => self.show_error(&e)?,
        }
        Ok(true)
    }

    async fn system_report(&mut self) -> Step {
        if !self.allowed(Permission::ViewReports)? {
            return Ok(true);
        }
        let report = self.engine.generate_report().await;
        writeln!(self.output, "--- System Report ---")?;
        writeln!(self.output, "Users: {}", report.users)?;
        writeln!(self.output, "Drugs: {}", report.drugs)?;
        writeln!(
            self.output,
            "Prescriptions: {} ({} pending)",
            report.prescriptions, report.pending_prescriptions
        )?;
        writeln!(self.output, "Transactions: {}", report.transactions)?;
        writeln!(self.output, "Low stock drugs: {}", report.low_stock)?;
        writeln!(self.output, "Daily Revenue: KES {}", report.daily_revenue)?;
        Ok(true)
    }

    async fn epidemic_trends(&mut self) -> Step {
        if !self.allowed(Permission::ViewReports)? {
            return Ok(true);
        }
        let alerts = self.engine.check_epidemic_trends().await;
        if alerts.is_empty() {
            writeln!(self.output, "No outbreak detected.")?;
        }
        for alert in alerts {
            writeln!(
                self.output,
                "OUTBREAK WARNING: {} ({} cases)",
                alert.diagnosis, alert.cases
            )?;
        }
        Ok(true)
    }

    async fn integrity_audit(&mut self) -> Step {
        if !self.allowed(Permission::AuditIntegrity)? {
            return Ok(true);
        }
        let report = self.engine.integrity_audit().await;
        writeln!(
            self.output,
            "Checked {} prescriptions and {} transactions.",
            report.prescriptions_checked, report.transactions_checked
        )?;
        if report.is_clean() {
            writeln!(self.output, "All signatures valid.")?;
            return Ok(true);
        }
        writeln!(self.output, "{ALERT_RULE}")?;
        for id in &report.tampered_prescriptions {
            writeln!(self.output, "SECURITY ALERT: prescription {id} failed verification")?;
        }
        for id in &report.tampered_transactions {
            writeln!(self.output, "SECURITY ALERT: transaction {id} failed verification")?;
        }
        writeln!(self.output, "{ALERT_RULE}")?;
        Ok(true)
    }

    // --- Doctor ---

    async fn doctor_menu(&mut self) -> Step {
        let entries = ["View Drugs (Inventory)", "Create Prescription", "Logout"];
        let Some(choice) = self.menu("DOCTOR DASHBOARD", &entries)? else {
            return Ok(false);
        };
        match choice.as_str() {
            "1" => self.view_drugs().await,
            "2" => self.create_prescription().await,
            "3" => self.logout(),
            _ => self.invalid_choice(),
        }
    }

    async fn view_drugs(&mut self) -> Step {
        if !self.allowed(Permission::ViewInventory)? {
            return Ok(true);
        }
        let drugs = self.engine.list_drugs().await;
        if drugs.is_empty() {
            writeln!(self.output, "No drugs in inventory.")?;
        }
        for d in drugs {
            writeln!(
                self.output,
                "{} - Stock: {} - Price: {} - Expires: {}",
                d.name, d.quantity, d.price, d.expiry_date
            )?;
        }
        Ok(true)
    }

    async fn create_prescription(&mut self) -> Step {
        let doctor = match self.session.authorize(Permission::Prescribe) {
            Ok(user) => user.username.clone(),
            Err(e) => {
                self.show_error(&e)?;
                return Ok(true);
            }
        };
        let Some(patient_name) = self.prompt("Patient Name: ")? else {
            return Ok(false);
        };
        let Some(drug_name) = self.prompt("Drug Name: ")? else {
            return Ok(false);
        };
        let Some(quantity) = self.prompt_parsed::<u32>("Quantity: ")? else {
            return Ok(false);
        };
        let Some(diagnosis) = self.prompt("Diagnosis: ")? else {
            return Ok(false);
        };
        let draft = PrescriptionDraft {
            doctor_name: doctor,
            patient_name,
            drug_name,
            quantity,
            date: None,
            diagnosis,
        };
        match self.engine.create_prescription(draft).await {
            Ok(p) => writeln!(
                self.output,
                "Prescription {} created and signed: {} x{} for {}.",
                p.id, p.drug_name, p.quantity, p.patient_name
            )?,
            Err(e) => self.show_error(&e)?,
        }
        Ok(true)
    }

    // --- Pharmacist ---

    async fn pharmacist_menu(&mut self) -> Step {
        let entries = [
            "View Pending Prescriptions",
            "Dispense Prescription",
            "Check Low Stock",
            "Check Expiry",
            "Add New Drug Stock",
            "Logout",
        ];
        let Some(choice) = self.menu("PHARMACIST DASHBOARD", &entries)? else {
            return Ok(false);
        };
        match choice.as_str() {
            "1" => self.pending_prescriptions().await,
            "2" => self.dispense().await,
            "3" => self.low_stock().await,
            "4" => self.expiry().await,
            "5" => self.add_drug().await,
            "6" => self.logout(),
            _ => self.invalid_choice(),
        }
    }

    async fn pending_prescriptions(&mut self) -> Step {
        if !self.allowed(Permission::Dispense)? {
            return Ok(true);
        }
        let pending = self.engine.pending_prescriptions().await;
        if pending.is_empty() {
            writeln!(self.output, "No pending prescriptions.")?;
        }
        for p in pending {
            writeln!(
                self.output,
                "ID: {} | Patient: {} | Drug: {} ({}) | Doctor: {} | Date: {}",
                p.id, p.patient_name, p.drug_name, p.quantity, p.doctor_name, p.date
            )?;
        }
        Ok(true)
    }

    async fn dispense(&mut self) -> Step {
        if !self.allowed(Permission::Dispense)? {
            return Ok(true);
        }
        let Some(id) = self.prompt_parsed::<u32>("Prescription ID: ")? else {
            return Ok(false);
        };
        match self.engine.dispense_prescription(id).await {
            Ok(receipt) => {
                writeln!(self.output, "Prescription {} dispensed.", receipt.prescription.id)?;
                writeln!(
                    self.output,
                    "Bill #{}: KES {} ({})",
                    receipt.transaction.id,
                    receipt.transaction.amount,
                    receipt.transaction.payment_method
                )?;
                writeln!(
                    self.output,
                    "Remaining stock of {}: {}",
                    receipt.prescription.drug_name, receipt.remaining_stock
                )?;
            }
            Err(e) => self.show_error(&e)?,
        }
        Ok(true)
    }

    async fn low_stock(&mut self) -> Step {
        if !self.allowed(Permission::ViewInventory)? {
            return Ok(true);
        }
        let low = self.engine.check_low_stock().await;
        if low.is_empty() {
            writeln!(self.output, "All stock levels are fine.")?;
        }
        for d in low {
            writeln!(
                self.output,
                "LOW STOCK: {} ({} left, minimum {})",
                d.name, d.quantity, d.min_threshold
            )?;
        }
        Ok(true)
    }

    async fn expiry(&mut self) -> Step {
        if !self.allowed(Permission::ViewInventory)? {
            return Ok(true);
        }
        let report = self.engine.check_expiry().await;
        if report.expired.is_empty()
            && report.expiring_soon.is_empty()
            && report.unreadable.is_empty()
        {
            writeln!(self.output, "No drugs expired or expiring soon.")?;
        }
        for d in &report.expired {
            writeln!(self.output, "EXPIRED: {} ({})", d.name, d.expiry_date)?;
        }
        for d in &report.expiring_soon {
            writeln!(self.output, "EXPIRING SOON: {} ({})", d.name, d.expiry_date)?;
        }
        for d in &report.unreadable {
            writeln!(
                self.output,
                "UNREADABLE EXPIRY: {} ('{}')",
                d.name, d.expiry_date
            )?;
        }
        Ok(true)
    }

    async fn add_drug(&mut self) -> Step {
        if !self.allowed(Permission::ManageInventory)? {
            return Ok(true);
        }
        let Some(name) = self.prompt("Name: ")? else {
            return Ok(false);
        };
        let Some(price) = self.prompt_parsed::<Decimal>("Price: ")? else {
            return Ok(false);
        };
        let Some(quantity) = self.prompt_parsed::<u32>("Quantity: ")? else {
            return Ok(false);
        };
        let Some(expiry) = self.prompt("Expiry (DD/MM/YYYY): ")? else {
            return Ok(false);
        };
        let Some(min_threshold) = self.prompt_parsed::<u32>("Min Threshold: ")? else {
            return Ok(false);
        };
        let drug = Drug::new(name, price, quantity, expiry, min_threshold);
        match self.engine.add_drug(drug).await {
            Ok(()) => writeln!(self.output, "Drug added.")?,
            Err(e) => self.show_error(&e)?,
        }
        Ok(true)
    }

    // --- Billing ---

    async fn billing_menu(&mut self) -> Step {
        let entries = [
            "Process Payment",
            "View Daily Revenue",
            "List Transactions",
            "Logout",
        ];
        let Some(choice) = self.menu("BILLING DASHBOARD", &entries)? else {
            return Ok(false);
        };
        match choice.as_str() {
            "1" => self.process_payment().await,
            "2" => self.daily_revenue().await,
            "3" => self.list_transactions().await,
            "4" => self.logout(),
            _ => self.invalid_choice(),
        }
    }

    async fn process_payment(&mut self) -> Step {
        if !self.allowed(Permission::ProcessPayments)? {
            return Ok(true);
        }
        let Some(id) = self.prompt_parsed::<u32>("Transaction ID (from bill): ")? else {
            return Ok(false);
        };
        let Some(method) = self.prompt("Payment Method (Cash/Insurance/Mobile): ")? else {
            return Ok(false);
        };
        let result = match method.parse::<PaymentMethod>() {
            Ok(method) => self.engine.process_payment(id, method).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(t) => writeln!(
                self.output,
                "Payment recorded: transaction {} (KES {}) paid by {}.",
                t.id, t.amount, t.payment_method
            )?,
            Err(e) => self.show_error(&e)?,
        }
        Ok(true)
    }

    async fn daily_revenue(&mut self) -> Step {
        if !self.allowed(Permission::ViewRevenue)? {
            return Ok(true);
        }
        let revenue = self.engine.daily_revenue().await;
        writeln!(self.output, "Daily Revenue: KES {revenue}")?;
        Ok(true)
    }

    async fn list_transactions(&mut self) -> Step {
        if !self.allowed(Permission::ViewRevenue)? {
            return Ok(true);
        }
        let transactions = self.engine.list_transactions().await;
        if transactions.is_empty() {
            writeln!(self.output, "No transactions.")?;
        }
        for t in transactions {
            writeln!(
                self.output,
                "#{} | Prescription {} | KES {} | {} | {}",
                t.id, t.prescription_id, t.amount, t.date, t.payment_method
            )?;
        }
        Ok(true)
    }

    fn invalid_choice(&mut self) -> Step {
        writeln!(self.output, "Invalid choice.")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::in_memory::InMemoryStores;
    use crate::infrastructure::signing::SigningAuthority;
    use chrono::NaiveDate;
    use std::sync::Arc;

    async fn run_script(
        stores: &InMemoryStores,
        signer: &Arc<SigningAuthority>,
        script: &str,
    ) -> String {
        let engine = PharmacyEngine::open(
            stores.boxed(),
            signer.clone(),
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())),
        )
        .await
        .unwrap();
        let mut output = Vec::new();
        Console::new(&engine, script.as_bytes(), &mut output)
            .run()
            .await
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn test_full_workflow_script() {
        let stores = InMemoryStores::new();
        let signer = Arc::new(SigningAuthority::ephemeral());
        let script = "\
pharm\n1234\n5\nParacetamol\n50.0\n100\n01/01/2030\n20\n6\n\
doc\n1234\n1\n2\nJane\nparacetamol\n30\nMalaria\n3\n\
pharm\n1234\n1\n2\n1\n6\n\
bill\n1234\n1\n1\nCash\n2\n4\n\
exit\n";
        let out = run_script(&stores, &signer, script).await;

        assert!(out.contains("Drug added."), "{out}");
        assert!(out.contains("Paracetamol - Stock: 100"), "{out}");
        assert!(out.contains("Prescription 1 created and signed"), "{out}");
        assert!(out.contains("ID: 1 | Patient: Jane | Drug: Paracetamol (30)"), "{out}");
        assert!(out.contains("Bill #1: KES 1500"), "{out}");
        assert!(out.contains("Remaining stock of Paracetamol: 70"), "{out}");
        assert!(out.contains("paid by Cash"), "{out}");
        assert!(out.contains("Daily Revenue: KES 1500"), "{out}");
        assert!(out.ends_with("Goodbye.\n"), "{out}");
    }

    #[tokio::test]
    async fn test_bad_login_and_eof() {
        let stores = InMemoryStores::new();
        let signer = Arc::new(SigningAuthority::ephemeral());
        let out = run_script(&stores, &signer, "doc\nwrong\nadmin\nadmin123\n9\n").await;
        assert!(out.contains("Invalid credentials."));
        assert!(out.contains("Login successful. Role: Admin"));
        assert!(out.contains("Invalid choice."));
        assert!(out.ends_with("Goodbye.\n"));
    }

    #[tokio::test]
    async fn test_tampered_prescription_shows_alert_banner() {
        let stores = InMemoryStores::new();
        let signer = Arc::new(SigningAuthority::ephemeral());
        run_script(
            &stores,
            &signer,
            "pharm\n1234\n5\nAmoxil\n10\n50\n01/01/2030\n5\n6\ndoc\n1234\n2\nJane\nAmoxil\n5\nFlu\n3\nexit\n",
        )
        .await;
        stores
            .prescriptions
            .edit(|ps| ps[0].quantity = 50)
            .await;

        let out = run_script(&stores, &signer, "pharm\n1234\n2\n1\n6\nexit\n").await;
        assert!(out.contains(ALERT_RULE), "{out}");
        assert!(out.contains("SECURITY ALERT"), "{out}");
        assert!(!out.contains("dispensed."), "{out}");
    }

    #[tokio::test]
    async fn test_invalid_number_is_reprompted() {
        let stores = InMemoryStores::new();
        let signer = Arc::new(SigningAuthority::ephemeral());
        let out = run_script(&stores, &signer, "pharm\n1234\n2\nabc\n7\n6\nexit\n").await;
        assert!(out.contains("Invalid value 'abc'"), "{out}");
        assert!(out.contains("Prescription 7 not found"), "{out}");
    }
}
