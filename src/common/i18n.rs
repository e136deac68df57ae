use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_LANG: &str = "pt";

// (chave, português, inglês)
const MESSAGES: &[(&str, &str, &str)] = &[
    ("validation_failed", "Um ou mais campos são inválidos.", "One or more fields are invalid."),
    ("insufficient_stock", "Estoque insuficiente. Disponível: {available}", "Insufficient stock. Available: {available}"),
    ("initial_stock_undefined", "Defina o estoque inicial antes de registrar entradas ou entregas.", "Set the initial stock before recording inflows or deliveries."),
    ("initial_stock_already_defined", "O estoque inicial já foi definido.", "The initial stock has already been set."),
    ("invalid_transition", "A solicitação não pode avançar a partir do status '{from}'.", "The request cannot advance from status '{from}'."),
    ("download_blocked", "Download temporariamente bloqueado. Tente novamente em {minutes} minuto(s).", "Download temporarily blocked. Try again in {minutes} minute(s)."),
    ("insufficient_data", "Dados insuficientes para a previsão. São necessárias ao menos 2 entregas.", "Not enough data for a forecast. At least 2 deliveries are required."),
    ("no_consumption_data", "Nenhum dado de consumo (entrega) encontrado para o filtro selecionado.", "No consumption (delivery) data found for the selected filter."),
    ("attachment_too_large", "O arquivo excede o limite de {max} MB.", "The file exceeds the {max} MB limit."),
    ("not_found", "{entity} não encontrado(a).", "{entity} not found."),
    ("email_already_exists", "Este e-mail já está em uso.", "This e-mail is already in use."),
    ("invalid_credentials", "E-mail ou senha inválidos.", "Invalid e-mail or password."),
    ("invalid_token", "Token de autenticação inválido ou ausente.", "Missing or invalid authentication token."),
    ("forbidden", "Permissão negada. Seu perfil não permite esta ação.", "Permission denied. Your role does not allow this action."),
    ("custom_token_disabled", "Login por token personalizado não está habilitado.", "Custom token sign-in is not enabled."),
    ("internal_error", "Ocorreu um erro inesperado. Verifique o log do servidor.", "An unexpected error occurred. Check the server log."),
    // Entidades
    ("unit", "Unidade", "Unit"),
    ("movement", "Movimentação", "Movement"),
    ("stock_entry", "Entrada de estoque", "Stock entry"),
    ("material_request", "Solicitação de material", "Material request"),
    ("attachment", "Anexo", "Attachment"),
    ("user", "Usuário", "User"),
];

/// Catálogo de mensagens por idioma.
#[derive(Clone)]
pub struct I18nStore {
    messages: Arc<HashMap<&'static str, HashMap<&'static str, &'static str>>>,
}

impl I18nStore {
    pub fn new() -> Self {
        let mut pt = HashMap::new();
        let mut en = HashMap::new();
        for (key, pt_msg, en_msg) in MESSAGES {
            pt.insert(*key, *pt_msg);
            en.insert(*key, *en_msg);
        }

        let mut messages = HashMap::new();
        messages.insert("pt", pt);
        messages.insert("en", en);

        Self { messages: Arc::new(messages) }
    }

    /// Traduz `key` substituindo `{nome}` pelos parâmetros. Idioma desconhecido cai para português.
    pub fn translate(&self, lang: &str, key: &str, params: &[(&str, String)]) -> String {
        let template = self
            .messages
            .get(lang)
            .and_then(|m| m.get(key))
            .or_else(|| self.messages.get(DEFAULT_LANG).and_then(|m| m.get(key)))
            .copied()
            .unwrap_or(key);

        params.iter().fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}
