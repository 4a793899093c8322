//! Per-scenario assembly of the Salesforce composite request and
//! interpretation of its response.
//!
//! | scenario                               | steps | numeric fields on parse failure |
//! |----------------------------------------|-------|---------------------------------|
//! | `Client_none`                          | 10    | `0`                             |
//! | `Location_none`                        | 9     | `null`                          |
//! | `Opportunity_close`, `Opportunity_none`| 3     | `0`                             |
//! | `Opportunity_open`, empty, unknown     | none  |                                 |

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::landbot_models::{CreateResponse, LooseText, OpportunityPayload};
use crate::models::{
    AccountContactRelation, BillingAddress, CompositeRequest, CompositeSubrequest,
    ContactRecord, CustomerAccount, Method, OpportunityRecord, QuoteRecord, RecordBody,
    RecordType, SiteAccount,
};
use crate::scenario::Scenario;

pub const DEFAULT_API_VERSION: &str = "v57.0";

/// Reference id of the opportunity step; its result carries the id we report.
pub const OPPORTUNITY_REF: &str = "oportunidad";
const CUSTOMER_REF: &str = "cliente";
const CONTACT_REF: &str = "contacto1";
const SITE_REF: &str = "ubicacion";
const PRICEBOOK_REF: &str = "catalogo";

const INSTALLER_CODE: &str = "134";
/// Error code Salesforce puts on the sub-requests rolled back by another failure.
const ROLLBACK_ERROR_CODE: &str = "PROCESSING_HALTED";
const DEFAULT_CUSTOMER_NAME: &str = "Cliente Genérico";

/// What to send for a numeric field that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericPolicy {
    DefaultZero,
    /// Leave it `null`; the `Location_none` template has always done this.
    NullOnFailure,
}

impl NumericPolicy {
    fn float(self, raw: &Option<Value>) -> Option<f64> {
        let parsed = raw.as_ref().and_then(parse_float);
        match self {
            NumericPolicy::DefaultZero => Some(parsed.unwrap_or(0.0)),
            NumericPolicy::NullOnFailure => parsed,
        }
    }

    fn int(self, raw: &Option<Value>) -> Option<i64> {
        let parsed = raw.as_ref().and_then(parse_int);
        match self {
            NumericPolicy::DefaultZero => Some(parsed.unwrap_or(0)),
            NumericPolicy::NullOnFailure => parsed,
        }
    }
}

/// Builds composite requests against one REST API version.
#[derive(Debug, Clone)]
pub struct CompositeBuilder {
    api_version: String,
}

impl Default for CompositeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_API_VERSION)
    }
}

impl CompositeBuilder {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
        }
    }

    /// Composite for the tag carried in the payload. `None` means nothing is
    /// submitted: empty or unknown tag, or an open opportunity.
    pub fn build(&self, payload: &OpportunityPayload) -> Option<CompositeRequest> {
        let scenario = payload.composer_type().parse::<Scenario>().ok()?;
        self.build_for(scenario, payload)
    }

    pub fn build_for(
        &self,
        scenario: Scenario,
        payload: &OpportunityPayload,
    ) -> Option<CompositeRequest> {
        let installation_type = installation_type(payload);
        let fields = Fields {
            payload,
            installation_type,
        };

        let steps = match scenario {
            Scenario::OpportunityOpen => return None,
            Scenario::ClientNone => self.new_client(&fields),
            Scenario::LocationNone => self.new_location(&fields),
            Scenario::OpportunityClose | Scenario::OpportunityNone => {
                self.new_opportunity(&fields)
            }
        };
        Some(CompositeRequest::atomic(steps))
    }

    /// Customer, contact, site, opportunity and quote.
    fn new_client(&self, f: &Fields<'_>) -> Vec<CompositeSubrequest> {
        let p = f.payload;
        let customer = reference(CUSTOMER_REF);
        let contact = reference(CONTACT_REF);
        let site = reference(SITE_REF);

        vec![
            self.create(
                "Account",
                CUSTOMER_REF,
                RecordBody::CustomerAccount(CustomerAccount {
                    master_record_id: format!(
                        "{}{}",
                        text(&p.master_record_id),
                        text(&p.registro_id)
                    ),
                    name: text_or(&p.name, DEFAULT_CUSTOMER_NAME),
                    phone: text(&p.phone),
                    tipo_cliente: text(&p.tipo_cliente),
                    tipo_documento: text(&p.tipo_documento),
                    numero_documento: text(&p.numero_documento),
                    billing: BillingAddress {
                        city: text(&p.billing_city),
                        country_code: text(&p.billing_country_code),
                        postal_code: text(&p.billing_postal_code),
                        state_code: text(&p.billing_state_code),
                        street: text(&p.billing_street),
                    },
                    record_type: RecordType::CUSTOMER,
                }),
            ),
            self.create(
                "Contact",
                CONTACT_REF,
                RecordBody::Contact(contact_record(p, customer.clone())),
            ),
            self.query(
                "cliente1",
                &format!("SELECT+Id+FROM+Account+WHERE+Id='{}'+LIMIT+1", customer),
            ),
            self.query(
                "contacto2",
                &format!("SELECT+Id+FROM+Contact+WHERE+Id='{}'+LIMIT+1", contact),
            ),
            self.query(
                "relacion1",
                &format!(
                    "SELECT+Id+FROM+AccountContactRelation+WHERE+AccountId+='{}'+AND+ContactId+='{}'+LIMIT+1",
                    customer, contact
                ),
            ),
            self.create(
                "Account",
                SITE_REF,
                RecordBody::SiteAccount(site_account(p, customer.clone())),
            ),
            self.create(
                "AccountContactRelation",
                "relacion2",
                RecordBody::AccountContactRelation(AccountContactRelation {
                    account_id: site.clone(),
                    contact_id: contact,
                }),
            ),
            self.create(
                "Opportunity",
                OPPORTUNITY_REF,
                RecordBody::Opportunity(opportunity_record(p, site, customer, true)),
            ),
            self.pricebook_query(),
            self.create(
                "Quote",
                "oferta",
                RecordBody::Quote(quote_record(
                    f,
                    &QuoteStyle {
                        numeric: NumericPolicy::DefaultZero,
                        blank_missing_text: true,
                        default_status: Some(""),
                        fractional_payback: false,
                    },
                )),
            ),
        ]
    }

    /// Contact, site, opportunity and quote under an existing customer account.
    fn new_location(&self, f: &Fields<'_>) -> Vec<CompositeSubrequest> {
        let p = f.payload;
        let account = text(&p.account_id_callback);
        let account_in_query = soql_id(&account);
        let contact = reference(CONTACT_REF);
        let site = reference(SITE_REF);

        vec![
            self.create(
                "Contact",
                CONTACT_REF,
                RecordBody::Contact(contact_record(p, account.clone())),
            ),
            self.query(
                "cliente1",
                &format!(
                    "SELECT+Id+FROM+Account+WHERE+Id='{}'+LIMIT+1",
                    account_in_query
                ),
            ),
            self.query(
                "contacto2",
                &format!("SELECT+Id+FROM+Contact+WHERE+Id='{}'+LIMIT+1", contact),
            ),
            self.query(
                "relacion1",
                &format!(
                    "SELECT+Id+FROM+AccountContactRelation+WHERE+AccountId+='{}'+AND+ContactId+='{}'+LIMIT+1",
                    account_in_query, contact
                ),
            ),
            self.create(
                "Account",
                SITE_REF,
                RecordBody::SiteAccount(site_account(p, account.clone())),
            ),
            self.create(
                "AccountContactRelation",
                "relacion2",
                RecordBody::AccountContactRelation(AccountContactRelation {
                    account_id: site.clone(),
                    contact_id: contact,
                }),
            ),
            self.create(
                "Opportunity",
                OPPORTUNITY_REF,
                RecordBody::Opportunity(opportunity_record(p, site, account, false)),
            ),
            self.pricebook_query(),
            self.create(
                "Quote",
                "PREoferta",
                RecordBody::Quote(quote_record(
                    f,
                    &QuoteStyle {
                        numeric: NumericPolicy::NullOnFailure,
                        blank_missing_text: false,
                        default_status: None,
                        fractional_payback: false,
                    },
                )),
            ),
        ]
    }

    /// Opportunity and quote directly under an existing account.
    fn new_opportunity(&self, f: &Fields<'_>) -> Vec<CompositeSubrequest> {
        let p = f.payload;
        let account = text(&p.account_id_callback);

        vec![
            self.create(
                "Opportunity",
                OPPORTUNITY_REF,
                RecordBody::Opportunity(opportunity_record(p, account.clone(), account, true)),
            ),
            self.pricebook_query(),
            self.create(
                "Quote",
                "PREoferta",
                RecordBody::Quote(quote_record(
                    f,
                    &QuoteStyle {
                        numeric: NumericPolicy::DefaultZero,
                        blank_missing_text: false,
                        default_status: Some("Draft"),
                        fractional_payback: true,
                    },
                )),
            ),
        ]
    }

    fn create(&self, sobject: &str, reference_id: &str, body: RecordBody) -> CompositeSubrequest {
        CompositeSubrequest {
            method: Method::Post,
            url: format!("/services/data/{}/sobjects/{}/", self.api_version, sobject),
            reference_id: reference_id.to_string(),
            body: Some(body),
        }
    }

    /// `soql` is already in URL form (`+` for spaces).
    fn query(&self, reference_id: &str, soql: &str) -> CompositeSubrequest {
        CompositeSubrequest {
            method: Method::Get,
            url: format!("/services/data/{}/query/?q={}", self.api_version, soql),
            reference_id: reference_id.to_string(),
            body: None,
        }
    }

    fn pricebook_query(&self) -> CompositeSubrequest {
        self.query(
            PRICEBOOK_REF,
            "SELECT+Id+FROM+PriceBook2+WHERE+IsStandard=true+LIMIT+1",
        )
    }
}

struct Fields<'a> {
    payload: &'a OpportunityPayload,
    installation_type: Option<String>,
}

struct QuoteStyle {
    numeric: NumericPolicy,
    /// Send `""` for missing text fields instead of leaving them out.
    blank_missing_text: bool,
    default_status: Option<&'static str>,
    fractional_payback: bool,
}

fn contact_record(p: &OpportunityPayload, account_id: String) -> ContactRecord {
    ContactRecord {
        account_id,
        first_name: text(&p.first_name),
        last_name: text(&p.last_name),
        mobile_phone: text(&p.contact_phone),
        email: text(&p.email),
        record_type: RecordType::CONTACT,
    }
}

fn site_account(p: &OpportunityPayload, parent_id: String) -> SiteAccount {
    SiteAccount {
        name: text(&p.site_name),
        phone: text(&p.site_phone),
        billing: BillingAddress {
            city: text(&p.site_billing_city),
            country_code: text(&p.site_billing_country_code),
            postal_code: text(&p.site_billing_postal_code),
            state_code: text(&p.site_billing_state_code),
            street: text(&p.site_billing_street),
        },
        parent_id,
        record_type: RecordType::SITE,
    }
}

/// `full_channel` carries distributor code, agency, solar figure and agent id;
/// the new-location flow does not collect them.
fn opportunity_record(
    p: &OpportunityPayload,
    account_id: String,
    customer_id: String,
    full_channel: bool,
) -> OpportunityRecord {
    let channel_text = |field: &Option<LooseText>| {
        if full_channel {
            text(field)
        } else {
            String::new()
        }
    };

    OpportunityRecord {
        name: text(&p.opportunity_name),
        account_id,
        tipo_cliente: text(&p.tipo_cliente),
        close_date: text(&p.close_date),
        master_record_id: format!("INC|{}", text(&p.registro_id)),
        customer_id,
        stage_name: text(&p.stage_name),
        distribuidor: text(&p.distribuidor),
        codigo_distribuidor: full_channel.then(|| text(&p.codigo_distribuidor)),
        agencia: full_channel.then(|| text(&p.agencia)),
        canal: text(&p.canal),
        canal_origen: text(&p.canal_origen),
        empresa_origen: text(&p.empresa_origen),
        subcanal: text(&p.subcanal),
        tipologia_origen: text(&p.tipologia_origen),
        campanya: text(&p.campanya),
        figura_solar: channel_text(&p.figura_solar),
        matricula_agente: channel_text(&p.matricula_agente),
        codigo_instalador: INSTALLER_CODE,
        record_type: RecordType::INSTALLATION_OPPORTUNITY,
    }
}

fn quote_record(f: &Fields<'_>, style: &QuoteStyle) -> QuoteRecord {
    let p = f.payload;
    let n = style.numeric;
    let optional_text = |field: &Option<LooseText>| {
        if style.blank_missing_text {
            Some(text(field))
        } else {
            field.as_ref().map(|t| t.as_str().to_string())
        }
    };
    let margin = p
        .margen_comision_instalador
        .clone()
        .or_else(|| p.margen_comision_instalador_legacy.clone());

    QuoteRecord {
        num_paneles: n.float(&p.num_paneles),
        potencia_total: n.float(&p.potencia_total),
        potencia_nominal_ins: n.float(&p.potencia_nominal_ins),
        capacidad_bateria: n.float(&p.capacidad_bateria),
        precio_con_iva: n.float(&p.precio_con_iva),
        tipo_impositivo: n.float(&p.tipo_impositivo),
        payback_oferta: if style.fractional_payback {
            n.float(&p.payback_oferta).map(Value::from)
        } else {
            n.int(&p.payback_oferta).map(Value::from)
        },
        produccion_anual_estimada: n.float(&p.produccion_anual_estimada),
        tipo_autoconsumo: optional_text(&p.tipo_autoconsumo),
        tipo_inversor: optional_text(&p.tipo_inversor),
        marca_inversor: optional_text(&p.marca_inversor),
        marca_panel: optional_text(&p.marca_panel),
        potencia_nominal_panel: n.float(&p.potencia_nominal_panel),
        tipo_instalacion: f.installation_type.clone(),
        tipo_estructura: optional_text(&p.tipo_estructura),
        cuota_suscripcion: p.cuota_suscripcion.clone().filter(|v| !v.is_null()),
        opportunity_id: reference(OPPORTUNITY_REF),
        name: optional_text(&p.oferta_id),
        pricebook_id: format!("@{{{}.records[0].Id}}", PRICEBOOK_REF),
        status: match style.default_status {
            Some(default) => Some(text_or(&p.status, default)),
            None => optional_text(&p.status),
        },
        asociado_wattwin: false,
        comision_instalador: n.float(&margin),
        preoferta_id: optional_text(&p.oferta_id),
        record_type: RecordType::PRE_QUOTE,
    }
}

/// `@{ref.id}`: the id produced by an earlier sub-request.
fn reference(reference_id: &str) -> String {
    format!("@{{{}.id}}", reference_id)
}

fn text(field: &Option<LooseText>) -> String {
    field
        .as_ref()
        .map(|t| t.as_str().to_string())
        .unwrap_or_default()
}

fn text_or(field: &Option<LooseText>, default: &str) -> String {
    match field {
        Some(t) if !t.as_str().is_empty() => t.as_str().to_string(),
        _ => default.to_string(),
    }
}

/// Record ids are alphanumeric; anything else is dropped before it reaches SOQL.
fn soql_id(id: &str) -> String {
    id.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn installation_type(p: &OpportunityPayload) -> Option<String> {
    [&p.tipo_instalacion, &p.tipo_instalacion_legacy]
        .into_iter()
        .flatten()
        .map(LooseText::as_str)
        .find(|raw| !raw.is_empty())
        .map(normalize_installation_type)
}

/// `MONOFASICO` / `TRIFASICO` in any case get their accented labels; other
/// values pass through unchanged.
pub fn normalize_installation_type(raw: &str) -> String {
    match raw.trim().to_uppercase().as_str() {
        "MONOFASICO" => "Monofásico".to_string(),
        "TRIFASICO" => "Trifásico".to_string(),
        _ => raw.to_string(),
    }
}

/// Leading-prefix float parse: `"12.5 kW"` is 12.5, `"abc"` is `None`.
pub fn parse_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => float_prefix()
            .find(s.trim_start())
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Leading-prefix integer parse: `"3.9"` is 3, `"12 años"` is 12.
pub fn parse_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)),
        Value::String(s) => int_prefix()
            .find(s.trim_start())
            .and_then(|m| m.as_str().parse::<i64>().ok()),
        _ => None,
    }
}

fn float_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("float prefix pattern is valid")
    })
}

fn int_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]?\d+").expect("integer prefix pattern is valid"))
}

/// Turns the composite response into the result handed back to the flow.
///
/// 1. a sub-response whose body is an error list: failure with code and text,
///    preferring the failing step over the ones rolled back with it
/// 2. a top-level `errors` field: failure
/// 3. otherwise success, with the id created by the opportunity step
pub fn interpret_response(response: Value) -> CreateResponse {
    let sub_responses = response
        .get("compositeResponse")
        .and_then(Value::as_array);

    match sub_responses {
        Some(subs) => {
            let errors: Vec<(String, Option<String>)> = subs
                .iter()
                .filter_map(|sub| {
                    let error = sub.get("body")?.as_array()?.first()?;
                    let code = error.get("errorCode").filter(|c| is_present(c))?;
                    Some((value_text(code), error.get("message").map(value_text)))
                })
                .collect();
            // With allOrNone every other step reports PROCESSING_HALTED; the
            // cause is the step that is not halted.
            let cause = errors
                .iter()
                .find(|(code, _)| code != ROLLBACK_ERROR_CODE)
                .or_else(|| errors.first())
                .cloned();
            if let Some((code, message)) = cause {
                return CreateResponse {
                    composite_response: Some(response),
                    ..CreateResponse::failure(format!(
                        "Error Salesforce: {} => {}",
                        code,
                        message.unwrap_or_default()
                    ))
                };
            }
        }
        None => {
            if let Some(errors) = response.get("errors").filter(|e| is_present(e)) {
                return CreateResponse {
                    errors: Some(errors.clone()),
                    ..CreateResponse::failure("Error global en Salesforce")
                };
            }
        }
    }

    let opportunity_id = sub_responses.and_then(|subs| {
        subs.iter()
            .filter(|sub| sub.get("referenceId").and_then(Value::as_str) == Some(OPPORTUNITY_REF))
            .find_map(|sub| sub.get("body")?.get("id")?.as_str().map(str::to_string))
    });

    CreateResponse {
        opportunity_id,
        composite_response: Some(response),
        ..CreateResponse::success("Enviado correctamente a Salesforce")
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
