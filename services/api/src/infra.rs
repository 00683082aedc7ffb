use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use frontline_support::workflows::casework::{
    AppointmentRecord, CaseId, CaseProgress, CaseRecord, CaseStatus, CaseStore, CaseUpdateRecord,
    CaseWorkflowEngine, CitizenId, CitizenRecord, DemandMetric, PipelineStage, ServiceCatalog,
    ServiceId, ServiceKind, ServiceRecord, StoreError, UpdateKind, UrgencyTier,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) engine: CaseWorkflowEngine<InMemoryStore, InMemoryStore>,
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Fields accepted when registering a citizen.
pub(crate) struct NewCitizen {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) phone: Option<String>,
    pub(crate) address: Option<String>,
    pub(crate) emergency_contact: Option<String>,
}

/// Fields accepted when submitting a case.
pub(crate) struct NewCase {
    pub(crate) citizen_id: CitizenId,
    pub(crate) title: String,
    pub(crate) description: String,
}

/// Fields accepted when an administrator registers a service.
pub(crate) struct NewService {
    pub(crate) name: String,
    pub(crate) kind: ServiceKind,
    pub(crate) department: String,
    pub(crate) location: String,
    pub(crate) contact_info: String,
    pub(crate) capacity_per_hour: u32,
    pub(crate) is_emergency: bool,
}

/// Everything the case detail endpoint needs in one read.
pub(crate) struct CaseDetail {
    pub(crate) case: CaseRecord,
    pub(crate) citizen: CitizenRecord,
    pub(crate) service: Option<ServiceRecord>,
    pub(crate) appointment: Option<AppointmentRecord>,
    pub(crate) updates: Vec<CaseUpdateRecord>,
}

/// One row of the case listing, pre-joined for API responses.
pub(crate) struct CaseListing {
    pub(crate) case: CaseRecord,
    pub(crate) citizen_name: String,
    pub(crate) assigned_service: Option<String>,
    pub(crate) appointment_time: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub(crate) struct CaseFilter {
    pub(crate) status: Option<CaseStatus>,
    pub(crate) urgency: Option<UrgencyTier>,
    pub(crate) skip: usize,
    pub(crate) limit: Option<usize>,
}

pub(crate) struct DashboardCounters {
    pub(crate) total_cases: usize,
    pub(crate) pending_cases: usize,
    pub(crate) completed_cases: usize,
    pub(crate) services_utilization: BTreeMap<String, f64>,
}

/// Single mutex-guarded store backing both pipeline ports and the CRUD
/// surface. Guarding every table with one lock is what makes the demand
/// counter's read-check-increment atomic across concurrent pipelines.
#[derive(Default)]
pub(crate) struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    citizens: BTreeMap<CitizenId, CitizenRecord>,
    cases: BTreeMap<CaseId, CaseRecord>,
    services: BTreeMap<ServiceId, ServiceRecord>,
    appointments: HashMap<CaseId, AppointmentRecord>,
    updates: Vec<CaseUpdateRecord>,
    metrics: HashMap<(ServiceId, NaiveDate), u64>,
    next_citizen_id: u64,
    next_case_id: u64,
    next_service_id: u64,
}

impl InMemoryStore {
    pub(crate) fn create_citizen(&self, citizen: NewCitizen) -> Result<CitizenRecord, StoreError> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        if guard
            .citizens
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&citizen.email))
        {
            return Err(StoreError::Conflict(
                "citizen with this email already exists".to_string(),
            ));
        }

        guard.next_citizen_id += 1;
        let record = CitizenRecord {
            id: CitizenId(guard.next_citizen_id),
            name: citizen.name,
            email: citizen.email,
            phone: citizen.phone,
            address: citizen.address,
            emergency_contact: citizen.emergency_contact,
        };
        guard.citizens.insert(record.id, record.clone());
        Ok(record)
    }

    pub(crate) fn citizen(&self, id: CitizenId) -> Option<CitizenRecord> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        guard.citizens.get(&id).cloned()
    }

    pub(crate) fn create_case(&self, case: NewCase) -> Result<CaseRecord, StoreError> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        // citizen must exist before a case can reference them
        if !guard.citizens.contains_key(&case.citizen_id) {
            return Err(StoreError::NotFound(format!("citizen {}", case.citizen_id)));
        }

        guard.next_case_id += 1;
        let record = CaseRecord {
            id: CaseId(guard.next_case_id),
            citizen_id: case.citizen_id,
            title: case.title,
            description: case.description,
            urgency: None,
            status: CaseStatus::Submitted,
            assigned_service_id: None,
            triage_notes: None,
            estimated_duration: None,
            created_at: Utc::now(),
        };
        guard.cases.insert(record.id, record.clone());
        Ok(record)
    }

    pub(crate) fn case_detail(&self, id: CaseId) -> Option<CaseDetail> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        let case = guard.cases.get(&id).cloned()?;
        let citizen = guard.citizens.get(&case.citizen_id).cloned()?;
        let service = case
            .assigned_service_id
            .and_then(|service_id| guard.services.get(&service_id).cloned());
        let appointment = guard.appointments.get(&id).cloned();
        let updates = guard
            .updates
            .iter()
            .filter(|update| update.case_id == id)
            .cloned()
            .collect();
        Some(CaseDetail {
            case,
            citizen,
            service,
            appointment,
            updates,
        })
    }

    pub(crate) fn list_cases(&self, filter: CaseFilter) -> Vec<CaseListing> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        guard
            .cases
            .values()
            .filter(|case| match filter.status {
                Some(status) => case.status == status,
                None => true,
            })
            .filter(|case| match filter.urgency {
                Some(urgency) => case.urgency == Some(urgency),
                None => true,
            })
            .skip(filter.skip)
            .take(filter.limit.unwrap_or(100))
            .map(|case| CaseListing {
                case: case.clone(),
                citizen_name: guard
                    .citizens
                    .get(&case.citizen_id)
                    .map(|citizen| citizen.name.clone())
                    .unwrap_or_default(),
                assigned_service: case
                    .assigned_service_id
                    .and_then(|service_id| guard.services.get(&service_id))
                    .map(|service| service.name.clone()),
                appointment_time: guard
                    .appointments
                    .get(&case.id)
                    .map(|appointment| appointment.scheduled_time),
            })
            .collect()
    }

    pub(crate) fn services(&self) -> Vec<ServiceRecord> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        guard.services.values().cloned().collect()
    }

    pub(crate) fn create_service(&self, service: NewService) -> ServiceRecord {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        guard.next_service_id += 1;
        let record = ServiceRecord {
            id: ServiceId(guard.next_service_id),
            name: service.name,
            kind: service.kind,
            department: service.department,
            location: service.location,
            contact_info: service.contact_info,
            capacity_per_hour: service.capacity_per_hour,
            is_emergency: service.is_emergency,
        };
        guard.services.insert(record.id, record.clone());
        record
    }

    pub(crate) fn dashboard_counters(&self) -> DashboardCounters {
        let guard = self.inner.lock().expect("store mutex poisoned");
        let total_cases = guard.cases.len();
        let pending_cases = guard
            .cases
            .values()
            .filter(|case| {
                matches!(
                    case.status,
                    CaseStatus::Submitted | CaseStatus::Triaged | CaseStatus::Assigned
                )
            })
            .count();
        let completed_cases = guard
            .cases
            .values()
            .filter(|case| case.status == CaseStatus::Completed)
            .count();

        let mut services_utilization = BTreeMap::new();
        for service in guard.services.values() {
            let assigned = guard
                .cases
                .values()
                .filter(|case| case.assigned_service_id == Some(service.id))
                .count();
            let utilization = if service.capacity_per_hour == 0 {
                0.0
            } else {
                (assigned as f64 / f64::from(service.capacity_per_hour) * 100.0).min(100.0)
            };
            services_utilization.insert(service.name.clone(), utilization);
        }

        DashboardCounters {
            total_cases,
            pending_cases,
            completed_cases,
            services_utilization,
        }
    }

    pub(crate) fn demand_metrics_since(&self, date: NaiveDate) -> Vec<DemandMetric> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        let mut rows: Vec<DemandMetric> = guard
            .metrics
            .iter()
            .filter(|((_, day), _)| *day >= date)
            .map(|((service_id, day), count)| DemandMetric {
                service_id: *service_id,
                date: *day,
                demand_count: *count,
            })
            .collect();
        rows.sort_by_key(|row| (row.date, row.service_id));
        rows
    }

    /// Load the sample catalog and citizens used for demos; no-op when
    /// services already exist.
    pub(crate) fn seed_demo_data(&self) {
        if !self.services().is_empty() {
            return;
        }

        self.create_service(NewService {
            name: "General Hospital Emergency".to_string(),
            kind: ServiceKind::Medical,
            department: "Emergency Medicine".to_string(),
            location: "123 Medical Center Dr".to_string(),
            contact_info: "555-0123".to_string(),
            capacity_per_hour: 20,
            is_emergency: true,
        });
        self.create_service(NewService {
            name: "Community Health Clinic".to_string(),
            kind: ServiceKind::Medical,
            department: "General Practice".to_string(),
            location: "456 Community Ave".to_string(),
            contact_info: "555-0124".to_string(),
            capacity_per_hour: 15,
            is_emergency: false,
        });
        self.create_service(NewService {
            name: "Emergency Response Unit".to_string(),
            kind: ServiceKind::Emergency,
            department: "Emergency Services".to_string(),
            location: "789 Safety Blvd".to_string(),
            contact_info: "911".to_string(),
            capacity_per_hour: 10,
            is_emergency: true,
        });
        self.create_service(NewService {
            name: "Social Services Office".to_string(),
            kind: ServiceKind::Social,
            department: "Social Welfare".to_string(),
            location: "321 Support St".to_string(),
            contact_info: "555-0125".to_string(),
            capacity_per_hour: 12,
            is_emergency: false,
        });
        self.create_service(NewService {
            name: "City Administration".to_string(),
            kind: ServiceKind::Administrative,
            department: "Administrative Services".to_string(),
            location: "654 City Hall".to_string(),
            contact_info: "555-0126".to_string(),
            capacity_per_hour: 25,
            is_emergency: false,
        });

        for (name, email, phone, address, emergency_contact) in [
            (
                "John Doe",
                "john.doe@example.com",
                "555-1001",
                "123 Main St",
                "Jane Doe - 555-1002",
            ),
            (
                "Sarah Smith",
                "sarah.smith@example.com",
                "555-1003",
                "456 Oak Ave",
                "Mike Smith - 555-1004",
            ),
            (
                "Robert Johnson",
                "robert.johnson@example.com",
                "555-1005",
                "789 Pine St",
                "Lisa Johnson - 555-1006",
            ),
        ] {
            let _ = self.create_citizen(NewCitizen {
                name: name.to_string(),
                email: email.to_string(),
                phone: Some(phone.to_string()),
                address: Some(address.to_string()),
                emergency_contact: Some(emergency_contact.to_string()),
            });
        }
    }
}

#[async_trait]
impl CaseStore for InMemoryStore {
    async fn load_case(&self, id: CaseId) -> Result<Option<CaseRecord>, StoreError> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        Ok(guard.cases.get(&id).cloned())
    }

    async fn load_citizen(&self, id: CitizenId) -> Result<CitizenRecord, StoreError> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        guard
            .citizens
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("citizen {id}")))
    }

    async fn save_case_progress(
        &self,
        id: CaseId,
        progress: CaseProgress,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        let case = guard
            .cases
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("case {id}")))?;
        if let Some(urgency) = progress.urgency {
            case.urgency = Some(urgency);
        }
        if let Some(status) = progress.status {
            case.status = status;
        }
        if let Some(service_id) = progress.assigned_service_id {
            case.assigned_service_id = Some(service_id);
        }
        if let Some(notes) = progress.triage_notes {
            case.triage_notes = Some(notes);
        }
        if let Some(duration) = progress.estimated_duration {
            case.estimated_duration = Some(duration);
        }
        Ok(())
    }

    async fn append_update(
        &self,
        id: CaseId,
        message: String,
        kind: UpdateKind,
        stage: PipelineStage,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        guard.updates.push(CaseUpdateRecord {
            case_id: id,
            message,
            kind,
            stage,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn create_appointment(&self, appointment: AppointmentRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        guard.appointments.insert(appointment.case_id, appointment);
        Ok(())
    }

    async fn confirm_appointment(&self, case_id: CaseId) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        if let Some(appointment) = guard.appointments.get_mut(&case_id) {
            appointment.confirmation_sent = true;
        }
        Ok(())
    }

    async fn record_demand(
        &self,
        service_id: ServiceId,
        date: NaiveDate,
        delta: u64,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        *guard.metrics.entry((service_id, date)).or_insert(0) += delta;
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryStore {
    async fn find_services(
        &self,
        kind: ServiceKind,
        emergency_only: bool,
    ) -> Result<Vec<ServiceRecord>, StoreError> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        Ok(guard
            .services
            .values()
            .filter(|service| service.kind == kind)
            .filter(|service| !emergency_only || service.is_emergency)
            .cloned()
            .collect())
    }

    async fn load_service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, StoreError> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        Ok(guard.services.get(&id).cloned())
    }
}
